pub mod admin;
pub mod auth;
pub mod binding;
pub mod conversations;
pub mod history;

use axum::http::HeaderMap;

use conduit_core::error::ConduitError;
use conduit_identity::auth::{verify_token, Claims};

use crate::app::AppState;
use crate::error::WebError;

/// Pulls `Authorization: Bearer <token>` and verifies it against the
/// configured signing secret (§4.1 "Token verification").
pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, WebError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebError(ConduitError::Unauthorized("missing Authorization header".into())))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| WebError(ConduitError::Unauthorized("expected a Bearer token".into())))?;
    verify_token(&state.config.auth.jwt_secret, token).map_err(WebError::from)
}

pub(crate) fn require_admin(claims: &Claims) -> Result<(), WebError> {
    if claims.role != "admin" {
        return Err(WebError(ConduitError::Forbidden("admin role required".into())));
    }
    Ok(())
}
