/// Session issuance and authentication extractors
use crate::{
    account::AccountStore,
    api::middleware::extract_bearer_token,
    config::MAX_SESSION_TTL_SECS,
    context::AppContext,
    db::account::{AccountProfile, Role},
    error::{PortalError, PortalResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates signed session tokens
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs.clamp(0, MAX_SESSION_TTL_SECS)),
        }
    }

    /// Issue a session for a verified account
    pub fn issue(&self, profile: &AccountProfile, now: DateTime<Utc>) -> PortalResult<String> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| PortalError::Internal("Session expiry out of range".to_string()))?;

        let claims = SessionClaims {
            sub: profile.id.clone(),
            email: profile.email.clone(),
            role: profile.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| PortalError::Jwt(format!("Failed to sign session: {}", e)))
    }

    /// Validate signature and expiry
    pub fn validate(&self, token: &str) -> PortalResult<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| PortalError::Authentication(format!("Invalid session token: {}", e)))
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
    pub claims: SessionClaims,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| PortalError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.sessions.validate(&token)?;

        Ok(AuthContext {
            account_id: claims.sub.clone(),
            claims,
        })
    }
}

/// Authenticated caller holding the admin role
///
/// The role is re-read from storage so a revoked admin loses access before
/// their token expires.
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub account_id: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;

        let account = state
            .accounts
            .find_by_id(&auth.account_id)
            .await?
            .ok_or_else(|| PortalError::Authentication("Account no longer exists".to_string()))?;

        if account.role != Role::Admin || !account.is_active {
            return Err(PortalError::Authorization("Admin access required".to_string()));
        }

        Ok(AdminAuthContext {
            account_id: account.id,
            email: account.email,
        })
    }
}
