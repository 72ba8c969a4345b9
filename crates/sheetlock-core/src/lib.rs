//! # sheetlock-core
//!
//! Shared building blocks for the Sheetlock edit coordinator.
//!
//! This crate provides:
//! - Identity types for users and documents
//! - The persisted [`LockRecord`] and [`OfflineSnapshot`] records
//! - The derived [`ConnectivityState`]
//! - An abstract persistence port ([`Store`]) with in-memory and
//!   directory-backed implementations
//! - A pluggable time source ([`Clock`])
//!
//! ## Example
//!
//! ```rust
//! use sheetlock_core::{LockRecord, MemoryStore, Store, StoreExt, UserId};
//!
//! let store = MemoryStore::new();
//! let record = LockRecord::held_by(UserId::new("alice"), 1_000);
//! store.put_json("lock:sheet", &record).unwrap();
//!
//! let loaded: Option<LockRecord> = store.get_json("lock:sheet").unwrap();
//! assert_eq!(loaded, Some(record));
//! ```

pub mod clock;
pub mod connectivity;
pub mod error;
pub mod ids;
pub mod lock_record;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use connectivity::ConnectivityState;
pub use error::{Result, StoreError};
pub use ids::{DocumentId, UserId, DEFAULT_DOCUMENT_ID};
pub use lock_record::LockRecord;
pub use snapshot::OfflineSnapshot;
pub use store::{FileStore, MemoryStore, Store, StoreExt};
