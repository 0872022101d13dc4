/// Admin API endpoints
///
/// Audit log review and resident role management. Every handler requires a
/// caller whose stored role is `admin`.
use crate::{
    account::AccountStore,
    audit::{self, AuditAction, AuditLogEntry, AuditQuery, AuditRecord, AuditSummary, ClientInfo},
    auth::AdminAuthContext,
    context::AppContext,
    db::account::{AccountProfile, Role},
    error::{PortalError, PortalResult},
    metrics,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;
const DEFAULT_SUMMARY_DAYS: i64 = 30;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/audit-logs", get(list_audit_logs))
        .route("/api/admin/audit-logs/summary", get(audit_summary))
        .route("/api/admin/accounts/:id/role", put(update_role))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditLogParams {
    action: Option<String>,
    user_id: Option<String>,
    since: Option<DateTime<Utc>>,
    limit: Option<i64>,
    before: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditLogPage {
    entries: Vec<AuditLogEntry>,
    /// Cursor for the next page, absent on the last page
    next_before: Option<i64>,
}

/// List audit entries, newest first
async fn list_audit_logs(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(params): Query<AuditLogParams>,
) -> PortalResult<Json<AuditLogPage>> {
    let action = params
        .action
        .as_deref()
        .map(str::parse::<AuditAction>)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);

    let entries = ctx
        .audit_log
        .list(&AuditQuery {
            action,
            user_id: params.user_id,
            since: params.since,
            before: params.before,
            limit,
        })
        .await?;

    let next_before = if entries.len() as i64 == limit {
        entries.last().map(|e| e.id)
    } else {
        None
    };

    Ok(Json(AuditLogPage {
        entries,
        next_before,
    }))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    since: Option<DateTime<Utc>>,
}

/// Counts per action over a window
async fn audit_summary(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(params): Query<SummaryParams>,
) -> PortalResult<Json<AuditSummary>> {
    let since = params
        .since
        .unwrap_or_else(|| Utc::now() - Duration::days(DEFAULT_SUMMARY_DAYS));

    Ok(Json(ctx.audit_log.summary(since).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateRoleRequest {
    role: Role,
    reason: Option<String>,
}

/// Change a resident's role and notify them of verification decisions
async fn update_role(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    client: ClientInfo,
    Path(account_id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> PortalResult<Json<AccountProfile>> {
    let Json(req) = payload.map_err(|e| PortalError::Validation(e.body_text()))?;

    if account_id == auth.account_id {
        return Err(PortalError::Validation(
            "Administrators cannot change their own role".to_string(),
        ));
    }

    let target = ctx
        .accounts
        .find_by_id(&account_id)
        .await?
        .ok_or_else(|| PortalError::NotFound("Account not found".to_string()))?;

    let previous = target.role;
    ctx.accounts.update_role(&target.id, req.role).await?;

    let mut details = format!(
        "Changed role of {} from {} to {}",
        target.email, previous, req.role
    );
    if let Some(reason) = &req.reason {
        details.push_str(&format!(": {}", reason));
    }

    audit::record_best_effort(
        ctx.audit_log.as_ref(),
        AuditRecord {
            user_id: Some(auth.account_id.clone()),
            action: AuditAction::RoleChanged,
            details: Some(details),
            client,
        },
    )
    .await;

    tracing::info!(
        admin_id = %auth.account_id,
        account_id = %target.id,
        from = %previous,
        to = %req.role,
        "Role updated"
    );

    if previous != req.role {
        if let Err(e) = ctx
            .mailer
            .send_role_notification(
                &target.email,
                &target.name,
                req.role,
                req.reason.as_deref(),
                &ctx.service_url(),
            )
            .await
        {
            metrics::NOTIFICATION_FAILURES_TOTAL
                .with_label_values(&[req.role.as_str()])
                .inc();
            tracing::warn!("Failed to notify {} of role change: {}", target.id, e);
        }
    }

    let mut profile = target.profile();
    profile.role = req.role;

    Ok(Json(profile))
}
