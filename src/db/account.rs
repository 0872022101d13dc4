/// Account database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::fmt;
use std::str::FromStr;

/// Account status gating downstream authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Registered, awaiting document verification
    Unverified,
    /// Verified resident
    #[serde(alias = "user")]
    Verified,
    /// Barangay administrator
    Admin,
    /// Registration rejected
    Rejected,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unverified => "unverified",
            Role::Verified => "verified",
            Role::Admin => "admin",
            Role::Rejected => "rejected",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unverified" => Ok(Role::Unverified),
            "verified" | "user" => Ok(Role::Verified),
            "admin" => Ok(Role::Admin),
            "rejected" => Ok(Role::Rejected),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    /// Consecutive failures since the last success or lock clear
    pub login_attempts: u32,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Account {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = role.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: e.into(),
        })?;
        let login_attempts: i64 = row.try_get("login_attempts")?;

        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            role,
            is_active: row.try_get("is_active")?,
            login_attempts: u32::try_from(login_attempts).unwrap_or(0),
            last_failed_login: row.try_get("last_failed_login")?,
            locked_until: row.try_get("locked_until")?,
            last_login: row.try_get("last_login")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Account {
    /// Fields safe to hand to the session issuer and to clients
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            is_active: self.is_active,
        }
    }
}

/// Public account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

/// Input for account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}
