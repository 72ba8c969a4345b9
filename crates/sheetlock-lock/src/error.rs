//! Error types for the lock manager.

use sheetlock_core::{StoreError, UserId};
use thiserror::Error;

/// Errors returned by lock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another viewer holds a live lock. The caller should fall back to
    /// read-only mode.
    #[error("Sheet is currently being edited by {holder}")]
    Conflict { holder: UserId },

    /// The lock is no longer held by this viewer; editing must be
    /// re-acquired.
    #[error("Editing session expired")]
    SessionExpired,

    /// The record kept changing underneath every attempt.
    #[error("Lock record is contended, try again")]
    Contended,

    #[error("Invalid lock configuration: {0}")]
    InvalidConfig(String),

    /// The shared store could not be read or written. Never treated as
    /// success.
    #[error("Lock storage failed: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LockError>;
