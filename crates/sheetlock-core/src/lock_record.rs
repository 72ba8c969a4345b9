//! The persisted write-lock record.
//!
//! Exactly one record exists per document. Every mutation replaces the whole
//! record so other viewers never observe a half-written lock.

use crate::clock::Timestamp;
use crate::ids::{key_component, DocumentId, UserId};
use serde::{Deserialize, Serialize};

/// Current write-lock state of one editable document.
///
/// `is_locked` is true exactly when `holder` is set. Records can only be
/// built through [`LockRecord::unlocked`] and [`LockRecord::held_by`];
/// decoded records should be checked with [`LockRecord::is_consistent`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    is_locked: bool,
    holder: Option<UserId>,
    /// Last renewal instant, not necessarily the original acquisition.
    acquired_at: Option<Timestamp>,
}

impl LockRecord {
    /// Storage key of the lock for a document.
    pub fn storage_key(document: &DocumentId) -> String {
        format!("lock:{}", key_component(document.as_str()))
    }

    /// The cleared record.
    pub fn unlocked() -> Self {
        Self {
            is_locked: false,
            holder: None,
            acquired_at: None,
        }
    }

    /// A record held by `holder`, last renewed at `at`.
    pub fn held_by(holder: UserId, at: Timestamp) -> Self {
        Self {
            is_locked: true,
            holder: Some(holder),
            acquired_at: Some(at),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn holder(&self) -> Option<&UserId> {
        self.holder.as_ref()
    }

    pub fn acquired_at(&self) -> Option<Timestamp> {
        self.acquired_at
    }

    /// Check if `user` is the current holder.
    pub fn is_held_by(&self, user: &UserId) -> bool {
        self.holder.as_ref() == Some(user)
    }

    /// Check if the record is held by anyone other than `user`.
    pub fn is_held_by_other(&self, user: &UserId) -> bool {
        matches!(&self.holder, Some(holder) if holder != user)
    }

    /// The same holder, renewed at `at`. Unlocked records stay unlocked.
    pub fn renewed(&self, at: Timestamp) -> Self {
        match &self.holder {
            Some(holder) => Self::held_by(holder.clone(), at),
            None => Self::unlocked(),
        }
    }

    /// Check the `is_locked == holder.is_some()` invariant. A held record
    /// must also carry its renewal time.
    pub fn is_consistent(&self) -> bool {
        match (&self.holder, self.acquired_at) {
            (Some(_), Some(_)) => self.is_locked,
            (None, None) => !self.is_locked,
            _ => false,
        }
    }

    /// Milliseconds since the last renewal. Zero when unlocked or when the
    /// renewal instant lies in the future (clock skew between viewers).
    pub fn elapsed_ms(&self, now: Timestamp) -> u64 {
        self.acquired_at
            .map(|at| now.saturating_sub(at))
            .unwrap_or(0)
    }

    /// `max(0, timeout - (now - acquired_at))`; zero when unlocked.
    pub fn remaining_ms(&self, now: Timestamp, timeout_ms: u64) -> u64 {
        if !self.is_locked {
            return 0;
        }
        timeout_ms.saturating_sub(self.elapsed_ms(now))
    }

    /// A held record expires once `timeout_ms` has elapsed since its last
    /// renewal.
    pub fn is_expired(&self, now: Timestamp, timeout_ms: u64) -> bool {
        self.is_locked && self.elapsed_ms(now) >= timeout_ms
    }
}

impl Default for LockRecord {
    fn default() -> Self {
        Self::unlocked()
    }
}
