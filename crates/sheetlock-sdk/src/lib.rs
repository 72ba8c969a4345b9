//! Sheetlock SDK - High-level API for coordinating edits to a shared sheet
//!
//! This SDK wires the two Sheetlock state machines into a single editor
//! session:
//!
//! - the **Session Lock Manager** (single-writer lock with inactivity expiry)
//! - the **Offline Continuity Manager** (grace period, snapshots, recovery)
//!
//! The two never talk to each other directly. An [`EditSession`] composes
//! them through explicit events and turns every outcome into a user
//! notification plus a [`SessionEvent`].
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use sheetlock_sdk::{Client, EditorConfig};
//!
//! let client = Client::new_with_memory_store("alice", EditorConfig::default());
//! let session = client.open_session("pipeline_2025_q3", true).unwrap();
//!
//! let mut editor = session.lock();
//! editor.begin_editing().unwrap();
//! editor.edit(json!({"B2": 42})).unwrap();
//! assert!(editor.is_held_by_self());
//! ```
//!
//! # Architecture
//!
//! - [`client`] - Entry point that opens sessions per document
//! - [`session`] - The composed editor session and its events
//! - [`ticker`] - The single scheduled re-evaluation task per session
//! - [`publish`] - Async publishing of committed edits
//! - [`notify`] - User notification sinks
//! - [`config`] - Editor configuration
//! - [`clock`] - Tokio-backed time source
//! - [`error`] - Error types

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod publish;
pub mod session;
pub mod ticker;

// Re-exports for convenience
pub use client::{Client, SharedSession};
pub use clock::TokioClock;
pub use config::{EditorConfig, EditorConfigBuilder};
pub use error::{Result, SdkError};
pub use notify::{MemoryNotifier, NoticeKind, Notifier, TracingNotifier};
pub use publish::{commit, MemoryPublisher, PublishError, Publisher};
pub use session::{EditSession, PendingCommit, RecoveryPrompt, SessionEvent, SessionView};
pub use ticker::Ticker;

// Re-export commonly used types from the lower layers
pub use sheetlock_core::{
    Clock, ConnectivityState, DocumentId, FileStore, ManualClock, MemoryStore, Store, StoreError,
    SystemClock, Timestamp, UserId, DEFAULT_DOCUMENT_ID,
};
pub use sheetlock_lock::{LockConfig, LockError, LockState};
pub use sheetlock_offline::{format_remaining, OfflineConfig, OfflineError, OfflineState};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::config::EditorConfig;
    pub use crate::error::SdkError;
    pub use crate::notify::{NoticeKind, Notifier};
    pub use crate::publish::{commit, Publisher};
    pub use crate::session::{EditSession, SessionEvent};
    pub use crate::ticker::Ticker;
}
