/// Login lockout policy
///
/// Pure decisions over the stored attempt counter and lock timestamp. Callers
/// capture `now` once per request and pass it to every function so a single
/// attempt is evaluated against one instant.
use crate::{
    config::{LockoutConfig, MAX_LOCKOUT_DURATION_SECS},
    error::{PortalError, PortalResult},
};
use chrono::{DateTime, Duration, Utc};

/// Default consecutive failures before lock
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lock length in seconds
pub const DEFAULT_LOCKOUT_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::seconds(DEFAULT_LOCKOUT_SECS),
        }
    }
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(config: &LockoutConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            lockout_duration: Duration::seconds(
                config
                    .lockout_duration_secs
                    .clamp(0, MAX_LOCKOUT_DURATION_SECS),
            ),
        }
    }
}

impl LockoutPolicy {
    /// Failures left before the account locks. Never negative.
    pub fn attempts_remaining(&self, current_attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(current_attempts)
    }

    pub fn should_lock(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    pub fn lockout_end_time(&self, start: DateTime<Utc>) -> PortalResult<DateTime<Utc>> {
        start
            .checked_add_signed(self.lockout_duration)
            .ok_or_else(|| PortalError::Internal("Lockout end time out of range".to_string()))
    }

    /// A lock holds while `now` is before `locked_until`
    pub fn is_locked(&self, locked_until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < locked_until
    }

    /// The lock has run out and can be cleared lazily
    ///
    /// True from `locked_until` onward, not only strictly after it, so an
    /// account is never reported as locked with zero seconds left.
    pub fn is_lockout_expired(&self, locked_until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        !self.is_locked(locked_until, now)
    }

    /// Whole seconds until the lock ends, rounded up; 0 once expired
    pub fn time_remaining(&self, locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let millis = (locked_until - now).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        (millis + 999) / 1000
    }

    /// Lock length in whole seconds
    pub fn lockout_secs(&self) -> i64 {
        self.lockout_duration.num_seconds()
    }
}
