//! Blob store errors

use std::fmt;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `container/name` that does not exist
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Container or blob name the backend refuses to address
    #[error("Invalid blob name: {0:?}")]
    InvalidName(String),

    /// Backend refused the request but may accept it later
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn not_found(blob: impl fmt::Display) -> Self {
        Self::NotFound(blob.to_string())
    }

    pub fn invalid_name(name: impl fmt::Display) -> Self {
        Self::InvalidName(name.to_string())
    }

    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }

    /// Whether repeating the same call could succeed.
    ///
    /// A missing blob or a rejected name stays that way, so output writes
    /// stop retrying on those.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
