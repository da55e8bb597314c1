//! Internal API authentication.

use super::{AppState, errors::ApiError};
use crate::consts;
use ntex::web;
use subtle::ConstantTimeEq;

fn is_authorized(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

/// Rejects the request unless it carries the internal API secret.
pub fn require_internal_secret(
    req: &web::HttpRequest,
    app_state: &AppState,
) -> Result<(), ApiError> {
    let provided = req
        .headers()
        .get(consts::INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !is_authorized(provided, &app_state.internal_api_secret) {
        logfire::warn!(
            "Rejected internal API request to {path}",
            path = req.path().to_string()
        );
        return Err(ApiError::Unauthenticated);
    }

    Ok(())
}
