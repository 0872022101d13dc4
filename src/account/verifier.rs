/// Credential verification with attempt counting and timed lockout
///
/// One login attempt walks these steps in order, stopping at the first
/// terminal outcome:
///
/// 1. look the account up by email (unknown email looks like a wrong password)
/// 2. reject inactive accounts
/// 3. reject while a lock is active, without comparing the password
/// 4. clear an expired lock
/// 5. compare the password and update the counters
use crate::{
    account::{
        lockout::LockoutPolicy,
        password,
        store::AccountStore,
    },
    audit::{self, AuditAction, AuditRecord, AuditSink, ClientInfo},
    db::account::{Account, AccountProfile, Role},
    error::{PortalError, PortalResult},
    metrics,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal outcome of a login attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success(AccountProfile),
    InvalidCredentials { attempts_left: u32 },
    AccountInactive,
    Locked { time_left: i64 },
}

impl LoginOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            LoginOutcome::Success(_) => "success",
            LoginOutcome::InvalidCredentials { .. } => "invalid_credentials",
            LoginOutcome::AccountInactive => "inactive",
            LoginOutcome::Locked { .. } => "locked",
        }
    }

    /// Split into the profile or the error to return to the client
    pub fn into_result(self) -> PortalResult<AccountProfile> {
        match self {
            LoginOutcome::Success(profile) => Ok(profile),
            LoginOutcome::InvalidCredentials { attempts_left } => {
                Err(PortalError::InvalidCredentials {
                    attempts_left: Some(attempts_left),
                })
            }
            LoginOutcome::AccountInactive => Err(PortalError::AccountInactive),
            LoginOutcome::Locked { time_left } => Err(PortalError::AccountLocked { time_left }),
        }
    }
}

/// Read-only lock status for countdown displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutStatus {
    pub is_locked: bool,
    pub time_left: i64,
    pub attempts_left: u32,
    pub login_attempts: u32,
    pub role: Role,
}

pub struct CredentialVerifier {
    store: Arc<dyn AccountStore>,
    audit: Arc<dyn AuditSink>,
    policy: LockoutPolicy,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn AccountStore>, audit: Arc<dyn AuditSink>, policy: LockoutPolicy) -> Self {
        Self {
            store,
            audit,
            policy,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Evaluate one login attempt at `now`
    ///
    /// Storage failures propagate as errors; every domain outcome is `Ok`.
    pub async fn verify(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> PortalResult<LoginOutcome> {
        let outcome = self.evaluate(email, password, client, now).await?;
        metrics::record_login_outcome(outcome.label());
        Ok(outcome)
    }

    async fn evaluate(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> PortalResult<LoginOutcome> {
        let Some(account) = self.store.find_by_email(email).await? else {
            // Same work and same answer as a first wrong password
            password::verify_dummy(password);
            return Ok(LoginOutcome::InvalidCredentials {
                attempts_left: self.policy.attempts_remaining(1),
            });
        };

        if !account.is_active {
            return Ok(LoginOutcome::AccountInactive);
        }

        if let Some(time_left) = self.reconcile_lock(&account, now).await? {
            return Ok(LoginOutcome::Locked { time_left });
        }

        if !password::verify_password(password, &account.password_hash)? {
            return self.register_failure(&account, client, now).await;
        }

        self.store.record_successful_login(&account.id, now).await?;

        audit::record_best_effort(
            self.audit.as_ref(),
            AuditRecord {
                user_id: Some(account.id.clone()),
                action: AuditAction::Login,
                details: Some(format!("Successful login ({})", account.role)),
                client: client.clone(),
            },
        )
        .await;

        tracing::info!(account_id = %account.id, role = %account.role, "Login succeeded");

        Ok(LoginOutcome::Success(account.profile()))
    }

    /// Report lock status without comparing a password
    ///
    /// The only write is clearing an expired lock. An unknown email reports
    /// the same status as a freshly registered, never-failed account. Accounts
    /// that have failed or been reviewed still show their counters and role.
    pub async fn probe(&self, email: &str, now: DateTime<Utc>) -> PortalResult<LockoutStatus> {
        let Some(account) = self.store.find_by_email(email).await? else {
            return Ok(LockoutStatus {
                is_locked: false,
                time_left: 0,
                attempts_left: self.policy.max_attempts,
                login_attempts: 0,
                role: Role::Unverified,
            });
        };

        if let Some(time_left) = self.reconcile_lock(&account, now).await? {
            return Ok(LockoutStatus {
                is_locked: true,
                time_left,
                attempts_left: 0,
                login_attempts: account.login_attempts,
                role: account.role,
            });
        }

        let login_attempts = if account.locked_until.is_some() {
            0
        } else {
            account.login_attempts
        };

        Ok(LockoutStatus {
            is_locked: false,
            time_left: 0,
            attempts_left: self.policy.attempts_remaining(login_attempts),
            login_attempts,
            role: account.role,
        })
    }

    /// Returns the seconds left if a lock is active; clears it if expired
    async fn reconcile_lock(&self, account: &Account, now: DateTime<Utc>) -> PortalResult<Option<i64>> {
        let Some(locked_until) = account.locked_until else {
            return Ok(None);
        };

        if !self.policy.is_lockout_expired(locked_until, now) {
            return Ok(Some(self.policy.time_remaining(locked_until, now)));
        }

        if self.store.clear_expired_lock(&account.id, now).await? {
            metrics::LAZY_UNLOCKS_TOTAL.inc();
            tracing::debug!(account_id = %account.id, "Cleared expired lock");
        }

        Ok(None)
    }

    async fn register_failure(
        &self,
        account: &Account,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> PortalResult<LoginOutcome> {
        let lock_until = self.policy.lockout_end_time(now)?;
        let recorded = self
            .store
            .record_failed_attempt(&account.id, now, self.policy.max_attempts, lock_until)
            .await?;

        let Some(failure) = recorded else {
            // A concurrent attempt locked the account after our lock check
            return match self.store.find_by_id(&account.id).await? {
                Some(Account {
                    locked_until: Some(until),
                    ..
                }) if self.policy.is_locked(until, now) => Ok(LoginOutcome::Locked {
                    time_left: self.policy.time_remaining(until, now),
                }),
                Some(current) => Ok(LoginOutcome::InvalidCredentials {
                    attempts_left: self.policy.attempts_remaining(current.login_attempts),
                }),
                None => Ok(LoginOutcome::InvalidCredentials {
                    attempts_left: self.policy.attempts_remaining(1),
                }),
            };
        };

        match failure.locked_until {
            Some(until) if self.policy.should_lock(failure.login_attempts) => {
                metrics::ACCOUNT_LOCKOUTS_TOTAL.inc();
                tracing::warn!(
                    account_id = %account.id,
                    attempts = failure.login_attempts,
                    "Account locked after repeated failed logins"
                );

                audit::record_best_effort(
                    self.audit.as_ref(),
                    AuditRecord {
                        user_id: Some(account.id.clone()),
                        action: AuditAction::AccountLocked,
                        details: Some(format!(
                            "Locked for {}s after {} failed attempts",
                            self.policy.lockout_secs(),
                            failure.login_attempts
                        )),
                        client: client.clone(),
                    },
                )
                .await;

                Ok(LoginOutcome::Locked {
                    time_left: self.policy.time_remaining(until, now),
                })
            }
            _ => Ok(LoginOutcome::InvalidCredentials {
                attempts_left: self.policy.attempts_remaining(failure.login_attempts),
            }),
        }
    }
}
