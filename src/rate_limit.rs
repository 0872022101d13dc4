/// Request throttling
///
/// Two global buckets: callers with a valid session token and everyone else.
/// This caps request volume only; per-account lockout is handled by the
/// credential verifier.
use crate::{
    api::middleware::extract_bearer_token,
    config::RateLimitConfig,
    context::AppContext,
    error::{PortalError, PortalResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Authenticated callers get this multiple of the base rate
const AUTHENTICATED_MULTIPLIER: u32 = 10;

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

fn non_zero(value: u32, fallback: u32) -> NonZeroU32 {
    NonZeroU32::new(value)
        .or_else(|| NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let unauth_quota = Quota::per_second(non_zero(config.requests_per_second, 10))
            .allow_burst(non_zero(config.burst_size, 50));

        let auth_quota = Quota::per_second(non_zero(
            config.requests_per_second.saturating_mul(AUTHENTICATED_MULTIPLIER),
            100,
        ))
        .allow_burst(non_zero(
            config.burst_size.saturating_mul(AUTHENTICATED_MULTIPLIER),
            500,
        ));

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check rate limit for a caller with a valid session
    pub fn check_authenticated(&self) -> PortalResult<()> {
        Self::check(&self.authenticated)
    }

    /// Check rate limit for an anonymous caller
    pub fn check_unauthenticated(&self) -> PortalResult<()> {
        Self::check(&self.unauthenticated)
    }

    fn check(limiter: &DirectLimiter) -> PortalResult<()> {
        limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            PortalError::RateLimitExceeded {
                // Retry-After is whole seconds
                retry_after: Duration::from_secs(wait.as_secs().max(1)),
            }
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, PortalError> {
    if !ctx.rate_limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    // Only a session that verifies earns the larger bucket
    let has_valid_session = extract_bearer_token(request.headers())
        .is_some_and(|token| ctx.sessions.validate(&token).is_ok());

    if has_valid_session {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    Ok(next.run(request).await)
}
