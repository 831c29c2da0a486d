//! Maps `ConduitError` onto the JSON error body / status code pairing
//! required by §7's error taxonomy for every authenticated HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use conduit_core::error::ConduitError;

/// Newtype so this crate can own the `IntoResponse` impl for an error type
/// defined in `conduit-core`.
pub struct WebError(pub ConduitError);

impl From<ConduitError> for WebError {
    fn from(e: ConduitError) -> Self {
        WebError(e)
    }
}

impl From<conduit_identity::error::IdentityError> for WebError {
    fn from(e: conduit_identity::error::IdentityError) -> Self {
        WebError(e.into())
    }
}

impl From<conduit_history::error::HistoryError> for WebError {
    fn from(e: conduit_history::error::HistoryError) -> Self {
        WebError(e.into())
    }
}

impl From<serde_json::Error> for WebError {
    fn from(e: serde_json::Error) -> Self {
        WebError(ConduitError::from(e))
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ConduitError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ConduitError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ConduitError::Forbidden(_) => StatusCode::FORBIDDEN,
            ConduitError::NotFound(_) => StatusCode::NOT_FOUND,
            ConduitError::Conflict(_) => StatusCode::CONFLICT,
            ConduitError::InvalidInput(_) | ConduitError::Serialization(_) => StatusCode::BAD_REQUEST,
            ConduitError::DependencyError(_) | ConduitError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConduitError::StreamError(_) | ConduitError::ContextOverflow(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConduitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.0.kind(),
            "message": self.0.user_message(),
        }));
        (status, body).into_response()
    }
}

pub type WebResult<T> = std::result::Result<T, WebError>;
