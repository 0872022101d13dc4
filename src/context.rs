/// Application context and dependency injection
use crate::{
    account::{AccountStore, CredentialVerifier, LockoutPolicy, SqliteAccountStore},
    audit::SqliteAuditLog,
    auth::SessionIssuer,
    config::ServerConfig,
    db::{self, account::{NewAccount, Role}},
    error::PortalResult,
    mailer::Mailer,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<SqliteAccountStore>,
    pub audit_log: Arc<SqliteAuditLog>,
    pub verifier: Arc<CredentialVerifier>,
    pub sessions: Arc<SessionIssuer>,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PortalResult<Self> {
        config.validate()?;

        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        }

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let ctx = Self::from_parts(config, db)?;
        ctx.ensure_bootstrap_admin().await?;

        Ok(ctx)
    }

    /// Wire services over an existing pool
    pub fn from_parts(config: ServerConfig, db: SqlitePool) -> PortalResult<Self> {
        let accounts = Arc::new(SqliteAccountStore::new(db.clone()));
        let audit_log = Arc::new(SqliteAuditLog::new(db.clone()));

        let verifier = Arc::new(CredentialVerifier::new(
            accounts.clone(),
            audit_log.clone(),
            LockoutPolicy::from(&config.lockout),
        ));

        let sessions = Arc::new(SessionIssuer::new(
            &config.authentication.jwt_secret,
            config.authentication.session_ttl_secs,
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self {
            config: Arc::new(config),
            db,
            accounts,
            audit_log,
            verifier,
            sessions,
            rate_limiter,
            mailer,
        })
    }

    /// Create the configured administrator if no account uses that email yet
    async fn ensure_bootstrap_admin(&self) -> PortalResult<()> {
        let Some(admin) = &self.config.authentication.bootstrap_admin else {
            return Ok(());
        };

        if self.accounts.find_by_email(&admin.email).await?.is_some() {
            tracing::debug!("Bootstrap admin {} already exists", admin.email);
            return Ok(());
        }

        let account = self
            .accounts
            .create_account(NewAccount {
                email: admin.email.clone(),
                name: admin.name.clone(),
                password: admin.password.clone(),
                role: Role::Admin,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Created bootstrap admin {}", account.email);
        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        self.config.public_url()
    }
}

#[cfg(test)]
impl AppContext {
    /// Context over a fresh in-memory database
    pub async fn for_tests() -> Self {
        let db = db::test_pool().await;
        Self::from_parts(ServerConfig::for_tests(), db).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapAdmin;

    #[tokio::test]
    async fn test_bootstrap_admin_created_once() {
        let mut config = ServerConfig::for_tests();
        config.authentication.bootstrap_admin = Some(BootstrapAdmin {
            email: "kapitan@example.com".to_string(),
            password: "barangay-admin-pass".to_string(),
            name: "Kapitan".to_string(),
        });

        let ctx = AppContext::from_parts(config, db::test_pool().await).unwrap();
        ctx.ensure_bootstrap_admin().await.unwrap();
        ctx.ensure_bootstrap_admin().await.unwrap();

        let admin = ctx
            .accounts
            .find_by_email("kapitan@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_context_uses_configured_lockout() {
        let mut config = ServerConfig::for_tests();
        config.lockout.max_attempts = 5;

        let ctx = AppContext::from_parts(config, db::test_pool().await).unwrap();
        assert_eq!(ctx.verifier.policy().max_attempts, 5);
        assert_eq!(ctx.service_url(), "http://localhost:8080");
    }
}
