//! Error types for conversion and the storage collaborators

use crate::storage::FileId;
use thiserror::Error;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors raised by the conversion core and the layers around it
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The caller broke a contract of the conversion API (blank names, undecodable input)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No identity is signed in to own stored artifacts
    #[error("No authenticated user")]
    Unauthenticated,

    #[error("File not found: {0}")]
    NotFound(FileId),
}

impl ConvertError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ConvertError::InvalidInput(msg.into())
    }
}
