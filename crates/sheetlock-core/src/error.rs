//! Error types for the persistence port.

use thiserror::Error;

/// Errors raised by a [`Store`](crate::Store) implementation.
///
/// Every variant means the caller cannot assume its write (or read) took
/// effect; none of them may be swallowed silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("I/O error on `{key}`: {message}")]
    Io { key: String, message: String },

    #[error("Corrupt record under `{key}`: {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    pub(crate) fn io(key: &str, err: std::io::Error) -> Self {
        StoreError::Io {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(key: &str, message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Whether the stored bytes could not be decoded, as opposed to the
    /// medium itself failing.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
