//! Error types for offline continuity.

use sheetlock_core::StoreError;
use thiserror::Error;

/// Errors returned by the offline manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfflineError {
    /// Snapshot storage failed; edits may not be safely retained.
    #[error("Unable to save changes locally: {0}")]
    Persistence(#[from] StoreError),

    #[error("Invalid offline configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, OfflineError>;
