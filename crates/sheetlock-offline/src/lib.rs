//! # sheetlock-offline
//!
//! Offline Continuity Manager: lets an editor keep working when the
//! connection drops, bounds how long that may last, and keeps the edits made
//! in the meantime until the user explicitly restores or discards them.
//!
//! - [`OfflineManager`] tracks connectivity and runs the grace countdown
//! - Snapshots are stored per (document, user) and never exposed to anyone
//!   else
//! - [`format_remaining`] renders countdowns as `mm:ss`
//!
//! ```rust
//! use serde_json::json;
//! use sheetlock_core::{DocumentId, ManualClock, MemoryStore, UserId};
//! use sheetlock_offline::{OfflineConfig, OfflineManager, SaveOutcome};
//!
//! let clock = ManualClock::new(0);
//! let mut offline = OfflineManager::new(
//!     MemoryStore::new(), clock.clone(), DocumentId::new("X"), UserId::new("A"),
//!     OfflineConfig::default(), true,
//! ).unwrap();
//!
//! // Snapshots are only taken while offline.
//! assert_eq!(offline.save_snapshot(json!({"a": 1})).unwrap(), SaveOutcome::Skipped);
//!
//! offline.set_connectivity(false);
//! assert!(matches!(offline.save_snapshot(json!({"a": 1})).unwrap(), SaveOutcome::Saved { .. }));
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod manager;

pub use config::{OfflineConfig, OfflineConfigBuilder};
pub use error::{OfflineError, Result};
pub use format::format_remaining;
pub use manager::{OfflineEvent, OfflineManager, OfflineState, SaveOutcome};
