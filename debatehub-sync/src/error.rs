//! Admission errors

use thiserror::Error;

use crate::events::CloseCode;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Room {0} is full")]
    RoomFull(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// WebSocket close code sent to the rejected connection
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Self::RoomFull(_) => CloseCode::RoomFull,
            Self::StorageUnavailable(_) => CloseCode::StorageUnavailable,
            Self::Internal(_) => CloseCode::InternalError,
        }
    }
}

impl From<debatehub_core::Error> for Error {
    fn from(err: debatehub_core::Error) -> Self {
        use debatehub_core::Error as CoreError;
        match err {
            CoreError::RoomFull(code) => Self::RoomFull(code),
            CoreError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
