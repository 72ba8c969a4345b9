//! Derived connectivity view.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// Connectivity as seen by one viewer. Derived, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub online: bool,
    pub offline_since: Option<Timestamp>,
    /// Countdown while editing offline; zero when online or expired.
    pub remaining_grace_ms: u64,
}

impl ConnectivityState {
    pub fn online() -> Self {
        Self {
            online: true,
            offline_since: None,
            remaining_grace_ms: 0,
        }
    }

    pub fn offline(since: Timestamp, remaining_grace_ms: u64) -> Self {
        Self {
            online: false,
            offline_since: Some(since),
            remaining_grace_ms,
        }
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::online()
    }
}
