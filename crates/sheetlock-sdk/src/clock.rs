//! Tokio-backed time source.

use sheetlock_core::{Clock, SystemClock, Timestamp};
use tokio::time::Instant;

/// A clock that follows the Tokio timer.
///
/// Wall-clock milliseconds are captured once at construction; after that the
/// clock advances with [`tokio::time::Instant`], so a paused test runtime
/// drives lock and offline deadlines deterministically.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: Instant,
    origin_ms: Timestamp,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_ms())
    }

    /// A clock reading `origin_ms` right now.
    pub fn starting_at(origin_ms: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Timestamp {
        self.origin_ms
            .saturating_add(self.origin.elapsed().as_millis() as Timestamp)
    }
}
