//! # sheetlock-lock
//!
//! Session Lock Manager: arbitrates single-writer access to a shared sheet
//! and evicts holders that stop renewing.
//!
//! The lock is advisory. Every viewer reads the same [`LockRecord`] from a
//! shared [`Store`](sheetlock_core::Store) and re-evaluates expiry each time
//! it observes it; there is no background process owning the record.
//!
//! ```text
//! Unlocked ──acquire──▶ EditingSelf ──idle ≥ timeout-lead──▶ WarningPending
//!    ▲                    │  ▲  renew / continue_editing          │
//!    │                    │  └────────────────────────────────────┘
//!    └──release / expiry──┘◀──────────── idle ≥ timeout ───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sheetlock_core::{DocumentId, ManualClock, MemoryStore, UserId};
//! use sheetlock_lock::{LockConfig, LockError, LockManager};
//!
//! let store = MemoryStore::new();
//! let clock = ManualClock::new(0);
//! let doc = DocumentId::default();
//!
//! let mut alice = LockManager::new(
//!     store.clone(), clock.clone(), doc.clone(), UserId::new("alice"), LockConfig::default(),
//! ).unwrap();
//! let mut bob = LockManager::new(
//!     store.clone(), clock.clone(), doc, UserId::new("bob"), LockConfig::default(),
//! ).unwrap();
//!
//! alice.acquire().unwrap();
//! assert!(matches!(bob.acquire(), Err(LockError::Conflict { .. })));
//! ```
//!
//! [`LockRecord`]: sheetlock_core::LockRecord

pub mod config;
pub mod error;
pub mod manager;

pub use config::{LockConfig, LockConfigBuilder};
pub use error::{LockError, Result};
pub use manager::{Acquisition, LockEvent, LockManager, LockState};
