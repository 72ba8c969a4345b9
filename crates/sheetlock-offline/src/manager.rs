//! Connectivity state machine and snapshot persistence.

use crate::config::OfflineConfig;
use crate::error::{OfflineError, Result};
use sheetlock_core::{
    Clock, ConnectivityState, DocumentId, OfflineSnapshot, Store, StoreExt, Timestamp, UserId,
};
use tracing::{debug, info, warn};

/// Connectivity as tracked by the offline manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfflineState {
    Online,
    /// Disconnected, editing allowed until the grace period runs out.
    Offline { since: Timestamp },
    /// Disconnected past the grace period; editing is suspended.
    OfflineExpired { since: Timestamp },
}

/// Connectivity transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfflineEvent {
    ConnectionLost { at: Timestamp },
    ConnectionRestored { offline_for_ms: u64 },
    /// The grace countdown reached zero while still offline.
    GraceExpired,
}

/// Result of [`OfflineManager::save_snapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { captured_at: Timestamp },
    /// Not offline; nothing to guard against.
    Skipped,
}

/// Offline continuity manager for one viewer of one document.
pub struct OfflineManager<S: Store, C: Clock> {
    store: S,
    clock: C,
    document: DocumentId,
    user: UserId,
    config: OfflineConfig,
    key: String,
    state: OfflineState,
    pending_recovery: bool,
    last_autosave: Option<Timestamp>,
    pending: Vec<OfflineEvent>,
}

impl<S: Store, C: Clock> OfflineManager<S, C> {
    /// Create a manager. Starting disconnected starts the grace countdown.
    pub fn new(
        store: S,
        clock: C,
        document: DocumentId,
        user: UserId,
        config: OfflineConfig,
        online: bool,
    ) -> Result<Self> {
        config.validate()?;
        let key = OfflineSnapshot::storage_key(&document, &user);
        let state = if online {
            OfflineState::Online
        } else {
            OfflineState::Offline {
                since: clock.now_ms(),
            }
        };

        Ok(Self {
            store,
            clock,
            document,
            user,
            config,
            key,
            state,
            pending_recovery: false,
            last_autosave: None,
            pending: Vec::new(),
        })
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn state(&self) -> OfflineState {
        self.state
    }

    // === Connectivity ===

    /// Feed a connectivity signal. Repeated identical signals are ignored.
    pub fn set_connectivity(&mut self, online: bool) -> Option<OfflineEvent> {
        let now = self.clock.now_ms();
        let event = match (online, self.state) {
            (true, OfflineState::Offline { since })
            | (true, OfflineState::OfflineExpired { since }) => {
                self.state = OfflineState::Online;
                self.last_autosave = None;
                let offline_for_ms = now.saturating_sub(since);
                info!(document = %self.document, user = %self.user, offline_for_ms, "connection restored");
                OfflineEvent::ConnectionRestored { offline_for_ms }
            }
            (false, OfflineState::Online) => {
                self.state = OfflineState::Offline { since: now };
                info!(document = %self.document, user = %self.user, "connection lost");
                OfflineEvent::ConnectionLost { at: now }
            }
            _ => return None,
        };
        Some(event)
    }

    /// Evaluate the grace countdown and return transitions since the last
    /// call.
    pub fn poll(&mut self) -> Vec<OfflineEvent> {
        if let OfflineState::Offline { since } = self.state {
            let now = self.clock.now_ms();
            if now.saturating_sub(since) >= self.config.grace_ms {
                warn!(document = %self.document, user = %self.user, "offline editing session expired");
                self.state = OfflineState::OfflineExpired { since };
                self.pending.push(OfflineEvent::GraceExpired);
            }
        }
        std::mem::take(&mut self.pending)
    }

    pub fn online(&self) -> bool {
        self.state == OfflineState::Online
    }

    /// Editing while disconnected, grace period still running.
    pub fn is_offline_mode(&self) -> bool {
        matches!(self.state, OfflineState::Offline { .. })
    }

    /// Disconnected past the grace period.
    pub fn is_suspended(&self) -> bool {
        matches!(self.state, OfflineState::OfflineExpired { .. })
    }

    /// Grace time left; zero when online or expired.
    pub fn offline_remaining_ms(&self) -> u64 {
        match self.state {
            OfflineState::Offline { since } => {
                let elapsed = self.clock.now_ms().saturating_sub(since);
                self.config.grace_ms.saturating_sub(elapsed)
            }
            _ => 0,
        }
    }

    pub fn connectivity(&self) -> ConnectivityState {
        match self.state {
            OfflineState::Online => ConnectivityState::online(),
            OfflineState::Offline { since } | OfflineState::OfflineExpired { since } => {
                ConnectivityState::offline(since, self.offline_remaining_ms())
            }
        }
    }

    /// Whether the periodic offline snapshot is due.
    pub fn autosave_due(&self) -> bool {
        match (self.state, self.last_autosave) {
            (OfflineState::Offline { .. }, Some(last)) => {
                self.clock.now_ms().saturating_sub(last) >= self.config.autosave_interval_ms
            }
            (OfflineState::Offline { .. }, None) => true,
            _ => false,
        }
    }

    /// When the grace countdown or, if `autosave_active`, the next periodic
    /// snapshot is due. The caller decides whether there is anything to
    /// snapshot; an overdue autosave with nothing to save is not a deadline.
    pub fn next_deadline(&self, autosave_active: bool) -> Option<Timestamp> {
        let OfflineState::Offline { since } = self.state else {
            return None;
        };
        let grace = since.saturating_add(self.config.grace_ms);
        match self.last_autosave {
            Some(last) if autosave_active => {
                Some(grace.min(last.saturating_add(self.config.autosave_interval_ms)))
            }
            _ => Some(grace),
        }
    }

    // === Snapshots ===

    /// Overwrite the snapshot for this (document, user). Skipped unless
    /// currently offline within the grace period.
    pub fn save_snapshot(&mut self, payload: serde_json::Value) -> Result<SaveOutcome> {
        if !self.is_offline_mode() {
            debug!(document = %self.document, "online, snapshot skipped");
            return Ok(SaveOutcome::Skipped);
        }

        let now = self.clock.now_ms();
        let snapshot = OfflineSnapshot::new(self.document.clone(), self.user.clone(), now, payload);
        if let Err(e) = self.store.put_json(&self.key, &snapshot) {
            warn!(document = %self.document, user = %self.user, error = %e, "offline snapshot not saved");
            return Err(OfflineError::Persistence(e));
        }

        self.last_autosave = Some(now);
        debug!(document = %self.document, user = %self.user, captured_at = now, "offline snapshot saved");
        Ok(SaveOutcome::Saved { captured_at: now })
    }

    /// The snapshot for this (document, user), if any. A record belonging to
    /// another pair reads as absent; an undecodable record is deleted.
    pub fn load_snapshot(&self) -> Result<Option<OfflineSnapshot>> {
        match self.store.get_json::<OfflineSnapshot>(&self.key) {
            Ok(Some(snapshot)) if snapshot.matches(&self.document, &self.user) => Ok(Some(snapshot)),
            Ok(Some(snapshot)) => {
                warn!(
                    key = %self.key,
                    found_document = %snapshot.document_id,
                    found_user = %snapshot.user_id,
                    "stale snapshot mismatch, ignoring"
                );
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_corrupt() => {
                warn!(key = %self.key, error = %e, "dropping undecodable snapshot");
                self.store.remove(&self.key)?;
                Ok(None)
            }
            Err(e) => Err(OfflineError::Persistence(e)),
        }
    }

    /// Delete the snapshot. Safe to call when none exists; a record under
    /// the key that belongs to another pair is left alone.
    pub fn clear_snapshot(&self) -> Result<()> {
        if self.load_snapshot()?.is_none() {
            return Ok(());
        }
        self.store.remove(&self.key)?;
        debug!(document = %self.document, user = %self.user, "offline snapshot cleared");
        Ok(())
    }

    // === Recovery ===

    /// Look for unsynced edits at startup or when the editor goes idle.
    /// While an edit session is active the check is skipped.
    pub fn check_recovery(&mut self, editing_active: bool) -> Result<Option<OfflineSnapshot>> {
        if editing_active {
            return Ok(None);
        }
        let snapshot = self.load_snapshot()?;
        self.pending_recovery = snapshot.is_some();
        if let Some(found) = &snapshot {
            info!(document = %self.document, user = %self.user, captured_at = found.captured_at, "unsynced offline edits found");
        }
        Ok(snapshot)
    }

    pub fn has_pending_recovery(&self) -> bool {
        self.pending_recovery
    }

    /// Take the snapshot back into the live document. The snapshot stays
    /// stored until a successful online save or an explicit discard.
    pub fn restore_snapshot(&mut self) -> Result<Option<OfflineSnapshot>> {
        let snapshot = self.load_snapshot()?;
        self.pending_recovery = false;
        Ok(snapshot)
    }

    /// Throw the snapshot away.
    pub fn discard_snapshot(&mut self) -> Result<()> {
        self.clear_snapshot()?;
        self.pending_recovery = false;
        Ok(())
    }
}
