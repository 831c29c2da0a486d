use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account disabled")]
    AccountDisabled,

    #[error("rate limited")]
    RateLimited,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("binding code invalid or expired")]
    BindingCodeInvalid,

    #[error("telegram chat already bound")]
    AlreadyBound,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("token error: {0}")]
    Token(String),
}

impl From<IdentityError> for conduit_core::error::ConduitError {
    fn from(e: IdentityError) -> Self {
        use conduit_core::error::ConduitError as CE;
        match e {
            IdentityError::NotFound(m) => CE::NotFound(m),
            IdentityError::InvalidCredentials => CE::Unauthorized("Invalid credentials".into()),
            IdentityError::AccountDisabled => CE::Unauthorized("Account disabled".into()),
            IdentityError::RateLimited => CE::RateLimited,
            IdentityError::Conflict(m) => CE::Conflict(m),
            IdentityError::InvalidInput(m) => CE::InvalidInput(m),
            IdentityError::PermissionDenied(m) => CE::Forbidden(m),
            IdentityError::BindingCodeInvalid => CE::InvalidInput("invalid or expired".into()),
            IdentityError::AlreadyBound => CE::Conflict("chat already bound".into()),
            IdentityError::Database(e) => CE::Database(e.to_string()),
            IdentityError::Token(m) => CE::Unauthorized(m),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
