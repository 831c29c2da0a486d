use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<HistoryError> for conduit_core::error::ConduitError {
    fn from(e: HistoryError) -> Self {
        use conduit_core::error::ConduitError as CE;
        match e {
            HistoryError::NotFound(m) => CE::NotFound(m),
            HistoryError::InvalidInput(m) => CE::InvalidInput(m),
            HistoryError::Database(e) => CE::Database(e.to_string()),
            HistoryError::Serialization(e) => CE::Serialization(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
