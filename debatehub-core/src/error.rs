use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Room {0} is full")]
    RoomFull(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid room code: {0}")]
    InvalidRoomCode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error comes from a collaborator that may recover on retry
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Conflict(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL check_violation / not_null_violation
                    "23514" | "23502" => Self::InvalidInput(db_err.message().to_string()),
                    // unique_violation: a concurrent writer took the key first
                    "23505" => Self::Conflict(db_err.message().to_string()),
                    _ => Self::StorageUnavailable(err.to_string()),
                }
            }
            _ => Self::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::TranscriptionFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
