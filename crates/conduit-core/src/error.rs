use thiserror::Error;

/// Cross-cutting error taxonomy shared by every ingress and admin surface.
///
/// Each crate is free to define a narrower error enum for its own internals
/// (see `conduit-identity::error::IdentityError`, etc.) and convert into this
/// one at the HTTP/webhook boundary via `#[from]` or `.into()`.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: too many attempts")]
    RateLimited,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dependency error: {0}")]
    DependencyError(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("context overflow: {0}")]
    ContextOverflow(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConduitError {
    /// Short error-taxonomy code per §7 of the specification. Used in logs
    /// and in any JSON error body that needs a stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ConduitError::Unauthorized(_) => "unauthorized",
            ConduitError::RateLimited => "rate_limited",
            ConduitError::Forbidden(_) => "forbidden",
            ConduitError::NotFound(_) => "not_found",
            ConduitError::Conflict(_) => "conflict",
            ConduitError::InvalidInput(_) => "invalid_input",
            ConduitError::DependencyError(_) => "dependency_error",
            ConduitError::StreamError(_) => "stream_error",
            ConduitError::ContextOverflow(_) => "context_overflow",
            ConduitError::Database(_) => "dependency_error",
            ConduitError::Serialization(_) => "invalid_input",
            ConduitError::Internal(_) => "dependency_error",
        }
    }

    /// User-facing message, never containing secrets or raw exception text
    /// (propagation policy in §7).
    pub fn user_message(&self) -> String {
        match self {
            ConduitError::Unauthorized(_) => "Invalid credentials".to_string(),
            ConduitError::RateLimited => "Too many attempts, please wait and try again".to_string(),
            ConduitError::Forbidden(_) => "You don't have permission to do that".to_string(),
            ConduitError::NotFound(_) => "Not found".to_string(),
            ConduitError::Conflict(_) => "That action conflicts with existing state".to_string(),
            ConduitError::InvalidInput(msg) => msg.clone(),
            ConduitError::DependencyError(_) => "System busy, please try again shortly".to_string(),
            ConduitError::StreamError(_) => {
                "AI service temporarily unavailable, please retry".to_string()
            }
            ConduitError::ContextOverflow(_) => {
                "Conversation history is too large — use /new to start a fresh conversation"
                    .to_string()
            }
            ConduitError::Database(_) => "System busy, please try again shortly".to_string(),
            ConduitError::Serialization(_) => "Malformed request".to_string(),
            ConduitError::Internal(_) => "Internal error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;
