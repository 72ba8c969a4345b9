//! The scheduled re-evaluation task for one session.
//!
//! One Tokio task per session sleeps until the nearest deadline the session
//! reports (warning, expiry, offline grace, periodic snapshot), capped by the
//! poll interval while a lock is live. State changes wake it early so it can
//! recompute. When nothing is being watched it parks until woken; there is
//! no free-running interval. Dropping the [`Ticker`] cancels the task.

use crate::client::SharedSession;
use sheetlock_core::{Clock, Store};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Handle to a session's scheduler task.
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Start scheduling `session`. Must be called inside a Tokio runtime.
    pub fn spawn<S, C>(session: SharedSession<S, C>) -> Self
    where
        S: Store + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let wake = session.lock().wake_handle();
        let handle = tokio::spawn(async move {
            loop {
                match next_wakeup(&session) {
                    Some(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => run_tick(&session),
                            _ = wake.notified() => trace!("ticker woken early"),
                        }
                    }
                    None => wake.notified().await,
                }
            }
        });
        Self { handle }
    }

    /// Stop the task. Idempotent.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn next_wakeup<S, C>(session: &SharedSession<S, C>) -> Option<Duration>
where
    S: Store + Clone,
    C: Clock + Clone,
{
    session.lock().next_wakeup()
}

fn run_tick<S, C>(session: &SharedSession<S, C>)
where
    S: Store + Clone,
    C: Clock + Clone,
{
    let mut editor = session.lock();
    if let Err(e) = editor.tick() {
        // Already surfaced through the notifier.
        debug!(session = %editor.session_id(), error = %e, "tick failed");
    }
}
