/// Account security
///
/// Handles credential verification, the login lockout policy, and the
/// account store the login flow reads and writes.

pub mod lockout;
pub mod password;
pub mod store;
pub mod verifier;

pub use lockout::LockoutPolicy;
pub use store::{AccountStore, SqliteAccountStore};
pub use verifier::{CredentialVerifier, LockoutStatus, LoginOutcome};

use crate::db::account::{AccountProfile, Role};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub is_active: bool,
    /// Signed session token
    pub token: String,
}

impl LoginResponse {
    pub fn new(profile: AccountProfile, token: String) -> Self {
        Self {
            message: "Login successful".to_string(),
            id: profile.id,
            email: profile.email,
            role: profile.role,
            name: profile.name,
            is_active: profile.is_active,
            token,
        }
    }
}

/// Lockout probe query
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LockoutStatusQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}
