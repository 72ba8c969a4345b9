//! Error types for the Sheetlock SDK.

use crate::publish::PublishError;
use sheetlock_core::UserId;
use sheetlock_lock::LockError;
use sheetlock_offline::OfflineError;
use thiserror::Error;

/// Error type for SDK operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Offline(#[from] OfflineError),

    /// This viewer does not hold the lock.
    #[error("Sheet is read-only{}", .holder.as_ref().map(|h| format!(" (locked by {})", h)).unwrap_or_default())]
    ReadOnly { holder: Option<UserId> },

    /// The offline grace period ran out; reconnect to continue.
    #[error("Editing is suspended until the connection is restored")]
    EditingSuspended,

    /// Unsynced offline edits must be restored or discarded first.
    #[error("Offline edits are waiting to be restored or discarded")]
    RecoveryPending,

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Cannot publish while offline")]
    NotConnected,

    /// Newer edits arrived while a commit was publishing; they were kept.
    #[error("Newer edits arrived while saving; save again to publish them")]
    CommitSuperseded,

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
