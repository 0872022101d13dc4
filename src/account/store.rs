/// Account store
///
/// The verifier is the only writer of the attempt counters. Each counter
/// mutation is a single conditional statement evaluated by SQLite, so two
/// concurrent failures for the same account cannot lose an increment.
use crate::{
    account::password,
    db::account::{Account, NewAccount, Role},
    error::{PortalError, PortalResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, email, name, password_hash, role, is_active, login_attempts,
     last_failed_login, locked_until, last_login, created_at";

/// Counter state after a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    pub login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Storage operations the login flow depends on
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> PortalResult<Option<Account>>;

    async fn find_by_id(&self, id: &str) -> PortalResult<Option<Account>>;

    /// Clear counters and lock fields if the lock has run out at `now`.
    /// Returns whether anything was cleared.
    async fn clear_expired_lock(&self, id: &str, now: DateTime<Utc>) -> PortalResult<bool>;

    /// Count one failure and set `locked_until = lock_until` when the new
    /// count reaches `max_attempts`.
    ///
    /// Returns `None` without changing anything if the account is missing or
    /// a lock is active at `now`.
    async fn record_failed_attempt(
        &self,
        id: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> PortalResult<Option<FailedAttempt>>;

    /// Reset counters and stamp `last_login`
    async fn record_successful_login(&self, id: &str, now: DateTime<Utc>) -> PortalResult<()>;
}

/// SQLite-backed account store
#[derive(Clone)]
pub struct SqliteAccountStore {
    db: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a new account
    pub async fn create_account(&self, new: NewAccount) -> PortalResult<Account> {
        if !new.email.contains('@') {
            return Err(PortalError::Validation("Invalid email format".to_string()));
        }
        if new.password.is_empty() {
            return Err(PortalError::Validation("Password cannot be empty".to_string()));
        }
        if self.find_by_email(&new.email).await?.is_some() {
            return Err(PortalError::Conflict("Email already registered".to_string()));
        }

        let password_hash = password::hash_password(&new.password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO account (id, email, name, password_hash, role, is_active, login_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        )
        .bind(&id)
        .bind(&new.email)
        .bind(&new.name)
        .bind(&password_hash)
        .bind(new.role.as_str())
        .bind(true)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Account {
            id,
            email: new.email,
            name: new.name,
            password_hash,
            role: new.role,
            is_active: true,
            login_attempts: 0,
            last_failed_login: None,
            locked_until: None,
            last_login: None,
            created_at: now,
        })
    }

    /// Change an account's role. Attempt counters are left alone.
    pub async fn update_role(&self, id: &str, role: Role) -> PortalResult<()> {
        let result = sqlx::query("UPDATE account SET role = ?1 WHERE id = ?2")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_by_email(&self, email: &str) -> PortalResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE email = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: &str) -> PortalResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    async fn clear_expired_lock(&self, id: &str, now: DateTime<Utc>) -> PortalResult<bool> {
        let result = sqlx::query(
            "UPDATE account
             SET login_attempts = 0, locked_until = NULL, last_failed_login = NULL
             WHERE id = ?1
               AND locked_until IS NOT NULL
               AND julianday(locked_until) <= julianday(?2)",
        )
        .bind(id)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_failed_attempt(
        &self,
        id: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> PortalResult<Option<FailedAttempt>> {
        // SET expressions see the pre-update row, so `login_attempts + 1` is
        // the new count in both assignments.
        let row = sqlx::query(
            "UPDATE account
             SET login_attempts = login_attempts + 1,
                 last_failed_login = ?2,
                 locked_until = CASE
                     WHEN login_attempts + 1 >= ?3 THEN ?4
                     ELSE locked_until
                 END
             WHERE id = ?1
               AND (locked_until IS NULL OR julianday(locked_until) <= julianday(?2))
             RETURNING login_attempts, locked_until",
        )
        .bind(id)
        .bind(now)
        .bind(i64::from(max_attempts))
        .bind(lock_until)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let login_attempts: i64 = row.try_get("login_attempts")?;
        let locked_until: Option<DateTime<Utc>> = row.try_get("locked_until")?;

        Ok(Some(FailedAttempt {
            login_attempts: u32::try_from(login_attempts).unwrap_or(u32::MAX),
            locked_until,
        }))
    }

    async fn record_successful_login(&self, id: &str, now: DateTime<Utc>) -> PortalResult<()> {
        sqlx::query(
            "UPDATE account
             SET login_attempts = 0, last_failed_login = NULL, locked_until = NULL, last_login = ?2
             WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
