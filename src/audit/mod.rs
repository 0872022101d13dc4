/// Audit trail
///
/// Records security-relevant actions. Writers treat the sink as fire-and-forget:
/// a failed audit write is logged and never fails the primary operation.
use crate::{
    error::{PortalError, PortalResult},
    metrics,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::fmt;
use std::str::FromStr;

/// Kinds of audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    AccountLocked,
    RoleChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::AccountLocked => "ACCOUNT_LOCKED",
            AuditAction::RoleChanged => "ROLE_CHANGED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOGIN" => Ok(AuditAction::Login),
            "ACCOUNT_LOCKED" => Ok(AuditAction::AccountLocked),
            "ROLE_CHANGED" => Ok(AuditAction::RoleChanged),
            _ => Err(PortalError::Validation(format!("Unknown audit action: {}", s))),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request origin attached to audit records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One record to write
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub details: Option<String>,
    pub client: ClientInfo,
}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> PortalResult<()>;
}

/// Write a record, logging and swallowing any failure
pub async fn record_best_effort(sink: &dyn AuditSink, record: AuditRecord) {
    let action = record.action;
    if let Err(e) = sink.record(record).await {
        metrics::AUDIT_WRITE_FAILURES_TOTAL.inc();
        tracing::warn!("Failed to write {} audit record: {}", action, e);
    }
}

/// Stored audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing audit entries
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub user_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Return entries with an id below this cursor
    pub before: Option<i64>,
    pub limit: i64,
}

/// Count for one action kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

/// Aggregate view over a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub since: DateTime<Utc>,
    pub total: i64,
    pub unique_users: i64,
    pub by_action: Vec<ActionCount>,
}

/// SQLite-backed audit log
#[derive(Clone)]
pub struct SqliteAuditLog {
    db: SqlitePool,
}

impl SqliteAuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// List entries newest first
    pub async fn list(&self, query: &AuditQuery) -> PortalResult<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, action, details, ip_address, user_agent, created_at
             FROM audit_log WHERE 1 = 1",
        );

        if let Some(action) = query.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(since) = query.since {
            builder
                .push(" AND julianday(created_at) >= julianday(")
                .push_bind(since)
                .push(")");
        }
        if let Some(before) = query.before {
            builder.push(" AND id < ").push_bind(before);
        }
        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(query.limit);

        let rows = builder.build().fetch_all(&self.db).await?;

        rows.iter()
            .map(|row| -> PortalResult<AuditLogEntry> {
                Ok(AuditLogEntry {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    action: row.try_get("action")?,
                    details: row.try_get("details")?,
                    ip_address: row.try_get("ip_address")?,
                    user_agent: row.try_get("user_agent")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Counts per action and distinct users since `since`
    pub async fn summary(&self, since: DateTime<Utc>) -> PortalResult<AuditSummary> {
        let rows = sqlx::query(
            "SELECT action, COUNT(*) AS count
             FROM audit_log
             WHERE julianday(created_at) >= julianday(?1)
             GROUP BY action
             ORDER BY count DESC, action ASC",
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let by_action = rows
            .iter()
            .map(|row| -> Result<ActionCount, sqlx::Error> {
                Ok(ActionCount {
                    action: row.try_get("action")?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let unique_users: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user_id)
             FROM audit_log
             WHERE user_id IS NOT NULL AND julianday(created_at) >= julianday(?1)",
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(AuditSummary {
            since,
            total: by_action.iter().map(|c| c.count).sum(),
            unique_users,
            by_action,
        })
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, record: AuditRecord) -> PortalResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (user_id, action, details, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&record.user_id)
        .bind(record.action.as_str())
        .bind(&record.details)
        .bind(&record.client.ip_address)
        .bind(&record.client.user_agent)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;

    fn record(user: &str, action: AuditAction) -> AuditRecord {
        AuditRecord {
            user_id: Some(user.to_string()),
            action,
            details: None,
            client: ClientInfo {
                ip_address: Some("203.0.113.7".to_string()),
                user_agent: Some("test-agent".to_string()),
            },
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _record: AuditRecord) -> PortalResult<()> {
            Err(PortalError::Internal("audit store offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let log = SqliteAuditLog::new(db::test_pool().await);

        log.record(record("u1", AuditAction::Login)).await.unwrap();
        log.record(record("u2", AuditAction::AccountLocked)).await.unwrap();
        log.record(record("u1", AuditAction::Login)).await.unwrap();

        let all = log
            .list(&AuditQuery {
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].id > all[1].id);
        assert_eq!(all[0].ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(all[0].user_agent.as_deref(), Some("test-agent"));

        let logins = log
            .list(&AuditQuery {
                action: Some(AuditAction::Login),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logins.len(), 2);
        assert!(logins.iter().all(|e| e.action == "LOGIN"));

        let for_u2 = log
            .list(&AuditQuery {
                user_id: Some("u2".to_string()),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_u2.len(), 1);
        assert_eq!(for_u2[0].action, "ACCOUNT_LOCKED");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let log = SqliteAuditLog::new(db::test_pool().await);
        for _ in 0..5 {
            log.record(record("u1", AuditAction::Login)).await.unwrap();
        }

        let page1 = log
            .list(&AuditQuery {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page1.len(), 2);

        let page2 = log
            .list(&AuditQuery {
                before: Some(page1[1].id),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page2.len(), 3);
        assert!(page2.iter().all(|e| e.id < page1[1].id));
    }

    #[tokio::test]
    async fn test_summary() {
        let log = SqliteAuditLog::new(db::test_pool().await);

        log.record(record("u1", AuditAction::Login)).await.unwrap();
        log.record(record("u2", AuditAction::Login)).await.unwrap();
        log.record(record("u2", AuditAction::AccountLocked)).await.unwrap();
        log.record(AuditRecord {
            user_id: None,
            action: AuditAction::RoleChanged,
            details: Some("system".to_string()),
            client: ClientInfo::default(),
        })
        .await
        .unwrap();

        let summary = log.summary(Utc::now() - Duration::days(1)).await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.unique_users, 2);
        assert_eq!(
            summary.by_action[0],
            ActionCount {
                action: "LOGIN".to_string(),
                count: 2
            }
        );

        let empty = log.summary(Utc::now() + Duration::days(1)).await.unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.by_action.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        record_best_effort(&FailingSink, record("u1", AuditAction::Login)).await;
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("login".parse::<AuditAction>().unwrap(), AuditAction::Login);
        assert_eq!(
            "ACCOUNT_LOCKED".parse::<AuditAction>().unwrap(),
            AuditAction::AccountLocked
        );
        assert!("DELETE_EVERYTHING".parse::<AuditAction>().is_err());
    }
}
