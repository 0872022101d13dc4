/// Resident and staff authentication endpoints
use crate::{
    account::{AccountStore, LockoutStatus, LockoutStatusQuery, LoginRequest, LoginResponse},
    api::validation_error,
    audit::ClientInfo,
    auth::AuthContext,
    context::AppContext,
    db::account::AccountProfile,
    error::{PortalError, PortalResult},
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use validator::Validate;

/// Build authentication routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/lockout-status", get(lockout_status))
        .route("/api/auth/session", get(session))
}

/// Verify credentials and issue a session
async fn login(
    State(ctx): State<AppContext>,
    client: ClientInfo,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> PortalResult<Json<LoginResponse>> {
    let Json(req) = payload.map_err(|e| PortalError::Validation(e.body_text()))?;
    req.validate().map_err(validation_error)?;

    let now = Utc::now();
    let profile = ctx
        .verifier
        .verify(&req.email, &req.password, &client, now)
        .await?
        .into_result()?;

    let token = ctx.sessions.issue(&profile, now)?;

    Ok(Json(LoginResponse::new(profile, token)))
}

/// Report lock status for the login page countdown
///
/// Unauthenticated. An unknown email looks like a fresh unverified account;
/// an account with failures or a reviewed role is distinguishable, which the
/// countdown display needs.
async fn lockout_status(
    State(ctx): State<AppContext>,
    Query(query): Query<LockoutStatusQuery>,
) -> PortalResult<Json<LockoutStatus>> {
    query.validate().map_err(validation_error)?;

    let status = ctx.verifier.probe(&query.email, Utc::now()).await?;
    Ok(Json(status))
}

/// Profile of the session holder
async fn session(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PortalResult<Json<AccountProfile>> {
    let account = ctx
        .accounts
        .find_by_id(&auth.account_id)
        .await?
        .ok_or_else(|| PortalError::Authentication("Account no longer exists".to_string()))?;

    if !account.is_active {
        return Err(PortalError::AccountInactive);
    }

    Ok(Json(account.profile()))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::test_support::{app, create_account, get, json_request, send, token_for, PASSWORD},
        db::account::Role,
        error::INVALID_CREDENTIALS_MESSAGE,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn login_body(email: &str, password: &str) -> serde_json::Value {
        json!({ "email": email, "password": password })
    }

    #[tokio::test]
    async fn test_login_success_returns_profile_and_token() {
        let (ctx, router) = app().await;
        let account = create_account(&ctx, "jose@example.com", Role::Verified).await;

        let (status, body) = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", PASSWORD)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["id"], account.id.as_str());
        assert_eq!(body["role"], "verified");
        assert_eq!(body["isActive"], true);

        let token = body["token"].as_str().unwrap();
        let claims = ctx.sessions.validate(token).unwrap();
        assert_eq!(claims.sub, account.id);
    }

    #[tokio::test]
    async fn test_login_lockout_flow() {
        let (ctx, router) = app().await;
        create_account(&ctx, "jose@example.com", Role::Verified).await;

        let (status, body) = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", "mali")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], INVALID_CREDENTIALS_MESSAGE);
        assert_eq!(body["attemptsLeft"], 2);

        send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", "mali")),
        )
        .await;

        let (status, body) = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", "mali")),
        )
        .await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["isLocked"], true);
        assert!(body["timeLeft"].as_i64().unwrap() > 0);

        // Correct password is still refused while locked
        let (status, _) = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", PASSWORD)),
        )
        .await;
        assert_eq!(status, StatusCode::LOCKED);

        let (status, body) = send(
            &router,
            get("/api/auth/lockout-status?email=jose@example.com", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isLocked"], true);
        assert_eq!(body["attemptsLeft"], 0);
        assert_eq!(body["loginAttempts"], 3);
        assert_eq!(body["role"], "verified");
    }

    #[tokio::test]
    async fn test_unknown_email_matches_first_failure() {
        let (ctx, router) = app().await;
        create_account(&ctx, "jose@example.com", Role::Verified).await;

        let known = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", "mali")),
        )
        .await;
        let unknown = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("nobody@example.com", "mali")),
        )
        .await;

        assert_eq!(known, unknown);
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let (ctx, router) = app().await;
        let account = create_account(&ctx, "jose@example.com", Role::Verified).await;
        sqlx::query("UPDATE account SET is_active = 0 WHERE id = ?1")
            .bind(&account.id)
            .execute(&ctx.db)
            .await
            .unwrap();

        let (status, body) = send(
            &router,
            json_request("POST", "/api/auth/login", login_body("jose@example.com", PASSWORD)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].is_string());
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let (_ctx, router) = app().await;

        let (status, body) = send(
            &router,
            json_request("POST", "/api/auth/login", json!({ "email": "jose@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password is required");

        let (status, _) = send(
            &router,
            json_request("POST", "/api/auth/login", json!("not an object")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_lockout_status_unknown_and_missing_email() {
        let (ctx, router) = app().await;

        let (status, body) = send(
            &router,
            get("/api/auth/lockout-status?email=nobody@example.com", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "isLocked": false,
                "timeLeft": 0,
                "attemptsLeft": 3,
                "loginAttempts": 0,
                "role": "unverified"
            })
        );

        create_account(&ctx, "bago@example.com", Role::Unverified).await;
        let (_, fresh) = send(
            &router,
            get("/api/auth/lockout-status?email=bago@example.com", None),
        )
        .await;
        assert_eq!(fresh, body);

        let (status, _) = send(&router, get("/api/auth/lockout-status", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_requires_valid_token() {
        let (ctx, router) = app().await;
        let account = create_account(&ctx, "jose@example.com", Role::Unverified).await;

        let (status, _) = send(&router, get("/api/auth/session", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, get("/api/auth/session", Some("bogus"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = token_for(&ctx, &account);
        let (status, body) = send(&router, get("/api/auth/session", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "jose@example.com");
        assert_eq!(body["role"], "unverified");
    }
}
