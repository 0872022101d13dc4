/// API routes and handlers
pub mod admin;
pub mod auth;
pub mod middleware;

use crate::{context::AppContext, error::PortalError};
use axum::Router;
use validator::ValidationErrors;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(admin::routes())
}

/// Collapse field errors into one client-facing message
pub(crate) fn validation_error(errors: ValidationErrors) -> PortalError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();

    PortalError::Validation(messages.join("; "))
}
