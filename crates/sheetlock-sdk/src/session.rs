//! The editor session: the lock and offline continuity composed.
//!
//! [`EditSession`] owns one [`LockManager`] and one [`OfflineManager`] for the
//! same (document, user) pair. Neither manager knows about the other; the
//! session drains their events, turns each one into a user notice and a
//! [`SessionEvent`], and decides what happens next (suspending editing,
//! offering recovery, dropping the working copy).
//!
//! All methods are synchronous except committing, see
//! [`commit`](crate::publish::commit).

use crate::config::EditorConfig;
use crate::error::{Result, SdkError};
use crate::notify::{NoticeKind, Notifier};
use crate::publish::PublishError;
use chrono::{DateTime, Local, Utc};
use sheetlock_core::{Clock, DocumentId, Store, StoreError, Timestamp, UserId};
use sheetlock_lock::{Acquisition, LockError, LockEvent, LockManager, LockState};
use sheetlock_offline::{
    format_remaining, OfflineError, OfflineEvent, OfflineManager, OfflineState, SaveOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

/// Events emitted by a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// This viewer holds the lock and may edit.
    EditingStarted { reentrant: bool },
    /// Someone else holds the lock; the sheet stays read-only.
    LockConflict { holder: UserId },
    /// The lock was given up from this session.
    LockReleased,
    WarningRaised { remaining_ms: u64 },
    WarningCleared,
    /// The lock timed out; the working copy was dropped.
    LockExpired,
    /// The lock went away without this session releasing it.
    LockLost { holder: Option<UserId> },
    ConnectionLost,
    ConnectionRestored { offline_for_ms: u64 },
    /// Offline grace ran out; editing is suspended until reconnect.
    OfflineExpired,
    SnapshotSaved { captured_at: Timestamp },
    RecoveryPending { captured_at: Timestamp },
    Restored { captured_at: Timestamp },
    SnapshotDiscarded,
    Committed,
    /// A publish completed but newer edits arrived meanwhile; they are kept.
    CommitSuperseded,
    StorageFailed { message: String },
}

/// The "restore or discard?" question shown when unsynced edits are found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryPrompt {
    pub captured_at: Timestamp,
    /// `captured_at` rendered in local time.
    pub captured_at_local: String,
}

impl RecoveryPrompt {
    pub fn new(captured_at: Timestamp) -> Self {
        let captured_at_local = i64::try_from(captured_at)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|utc| {
                utc.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "an unknown time".to_string());

        Self {
            captured_at,
            captured_at_local,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "You have unsynced changes from {}. Restore them or discard them?",
            self.captured_at_local
        )
    }
}

/// What a commit is publishing, tied to the edit it was taken from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommit {
    pub document: DocumentId,
    pub user: UserId,
    pub payload: serde_json::Value,
    revision: u64,
}

/// Everything a UI needs to render the session at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub document: DocumentId,
    pub user: UserId,
    pub lock_state: LockState,
    pub holder: Option<UserId>,
    pub remaining_ms: u64,
    pub warning_pending: bool,
    pub can_edit: bool,
    pub offline_state: OfflineState,
    pub offline_remaining_ms: u64,
    pub recovery: Option<RecoveryPrompt>,
}

impl SessionView {
    pub fn online(&self) -> bool {
        self.offline_state == OfflineState::Online
    }

    pub fn has_pending_recovery(&self) -> bool {
        self.recovery.is_some()
    }

    /// Lock countdown as `mm:ss`.
    pub fn remaining_label(&self) -> String {
        format_remaining(self.remaining_ms)
    }

    /// Offline countdown as `mm:ss`.
    pub fn offline_remaining_label(&self) -> String {
        format_remaining(self.offline_remaining_ms)
    }
}

/// An editor bound to one document for one user.
pub struct EditSession<S: Store + Clone, C: Clock + Clone> {
    session_id: String,
    lock: LockManager<S, C>,
    offline: OfflineManager<S, C>,
    clock: C,
    notifier: Arc<dyn Notifier>,
    poll_interval_ms: u64,
    /// Live document content while editing.
    working: Option<serde_json::Value>,
    /// Bumped whenever the working copy is replaced.
    revision: u64,
    recovery: Option<RecoveryPrompt>,
    event_tx: broadcast::Sender<SessionEvent>,
    wake: Arc<Notify>,
}

impl<S: Store + Clone, C: Clock + Clone> EditSession<S, C> {
    /// Open a session. Expired locks are swept and leftover offline edits are
    /// looked for right away.
    pub fn new(
        store: S,
        clock: C,
        document: DocumentId,
        user: UserId,
        config: EditorConfig,
        notifier: Arc<dyn Notifier>,
        online: bool,
    ) -> Result<Self> {
        config.validate()?;
        let lock = LockManager::new(
            store.clone(),
            clock.clone(),
            document.clone(),
            user.clone(),
            config.lock,
        )?;
        let offline = OfflineManager::new(store, clock.clone(), document, user, config.offline, online)?;
        let (event_tx, _) = broadcast::channel(100);

        let mut session = Self {
            session_id: ulid::Ulid::new().to_string(),
            lock,
            offline,
            clock,
            notifier,
            poll_interval_ms: config.poll_interval_ms,
            working: None,
            revision: 0,
            recovery: None,
            event_tx,
            wake: Arc::new(Notify::new()),
        };

        info!(
            session = %session.session_id,
            document = %session.document(),
            user = %session.user(),
            online,
            "session opened"
        );
        session.drain_lock_events();
        session.check_idle_recovery();
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn document(&self) -> &DocumentId {
        self.lock.document()
    }

    pub fn user(&self) -> &UserId {
        self.lock.user()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Handle used by the [`Ticker`](crate::ticker::Ticker) to be woken when
    /// deadlines move.
    pub fn wake_handle(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// The live document content, if editing.
    pub fn working_copy(&self) -> Option<&serde_json::Value> {
        self.working.as_ref()
    }

    // === Lock ===

    /// Enter edit mode. On conflict the session stays read-only and the
    /// holder is reported.
    pub fn begin_editing(&mut self) -> Result<Acquisition> {
        if self.offline.is_suspended() {
            return Err(SdkError::EditingSuspended);
        }
        if self.offline.has_pending_recovery() {
            self.notice(
                NoticeKind::Warning,
                "Unsynced Changes: Restore or discard your offline changes before editing.",
            );
            return Err(SdkError::RecoveryPending);
        }
        self.acquire_lock()
    }

    /// Replace the working copy. Counts as activity and, while offline,
    /// snapshots the new content.
    pub fn edit(&mut self, payload: serde_json::Value) -> Result<()> {
        self.record_activity()?;
        self.working = Some(payload);
        self.revision += 1;
        if self.offline.is_offline_mode() {
            self.save_working()?;
        }
        Ok(())
    }

    /// Reset the inactivity countdown without changing content.
    pub fn record_activity(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let was_warning = self.lock.warning_pending();
        let renewed = self.lock.renew();
        let renewed = self.check_lock(renewed)?;
        self.drain_lock_events();

        if !renewed {
            return Err(SdkError::ReadOnly {
                holder: self.lock.holder().cloned(),
            });
        }
        if was_warning {
            self.emit(SessionEvent::WarningCleared);
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Answer the expiry warning by continuing to edit.
    pub fn continue_editing(&mut self) -> Result<()> {
        let result = self.lock.continue_editing();
        self.drain_lock_events();
        match result {
            Ok(()) => {
                self.notice(
                    NoticeKind::Info,
                    "Editing Continued: Your editing session has been extended.",
                );
                self.emit(SessionEvent::WarningCleared);
                self.wake.notify_one();
                Ok(())
            }
            Err(e) => Err(self.lock_failed(e)),
        }
    }

    /// Answer the expiry warning by dropping the working copy, the offline
    /// snapshot, and the lock.
    pub fn discard_and_release(&mut self) -> Result<()> {
        let released = self.lock.discard_and_release();
        self.check_lock(released)?;
        self.working = None;
        self.drain_lock_events();

        let cleared = self.offline.discard_snapshot();
        self.check_offline(cleared)?;
        self.recovery = None;

        self.notice(
            NoticeKind::Info,
            "Edit Mode Disabled: Your changes have been discarded.",
        );
        self.emit(SessionEvent::LockReleased);
        self.wake.notify_one();
        Ok(())
    }

    /// Leave edit mode. An offline snapshot, if any, is kept and offered for
    /// recovery.
    pub fn release(&mut self) -> Result<bool> {
        let released = self.lock.release();
        let released = self.check_lock(released)?;
        self.working = None;
        self.drain_lock_events();

        if released {
            self.notice(
                NoticeKind::Info,
                "Edit Mode Disabled: Sheet editing has been disabled and the lock has been released.",
            );
            self.emit(SessionEvent::LockReleased);
        }
        self.check_idle_recovery();
        self.wake.notify_one();
        Ok(released)
    }

    /// Milliseconds left before the lock expires, re-read from the store.
    pub fn remaining_ms(&mut self) -> Result<u64> {
        let remaining = self.lock.remaining_ms();
        let remaining = self.check_lock(remaining)?;
        self.drain_lock_events();
        Ok(remaining)
    }

    pub fn is_held_by_self(&self) -> bool {
        self.lock.is_held_by_self()
    }

    pub fn is_held_by_other(&self) -> bool {
        self.lock.is_held_by_other()
    }

    pub fn warning_pending(&self) -> bool {
        self.lock.warning_pending()
    }

    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    // === Connectivity ===

    /// Feed a connectivity signal from the environment.
    pub fn on_connectivity_change(&mut self, online: bool) {
        if let Some(event) = self.offline.set_connectivity(online) {
            self.handle_offline_event(event);
        }
        self.wake.notify_one();
    }

    pub fn online(&self) -> bool {
        self.offline.online()
    }

    pub fn offline_state(&self) -> OfflineState {
        self.offline.state()
    }

    pub fn offline_remaining_ms(&self) -> u64 {
        self.offline.offline_remaining_ms()
    }

    // === Snapshots and recovery ===

    /// Snapshot the working copy now. Returns the capture time, or `None`
    /// when there was nothing to save or the session is online.
    pub fn save_snapshot(&mut self) -> Result<Option<Timestamp>> {
        self.save_working()
    }

    pub fn has_pending_recovery(&self) -> bool {
        self.offline.has_pending_recovery()
    }

    pub fn recovery_prompt(&self) -> Option<&RecoveryPrompt> {
        self.recovery.as_ref()
    }

    /// Load the unsynced snapshot back into the working copy and re-acquire
    /// the lock. If the lock is taken the recovery stays pending.
    pub fn restore_snapshot(&mut self) -> Result<Option<serde_json::Value>> {
        if self.offline.is_suspended() {
            return Err(SdkError::EditingSuspended);
        }
        let loaded = self.offline.load_snapshot();
        let Some(snapshot) = self.check_offline(loaded)? else {
            let restored = self.offline.restore_snapshot();
            self.check_offline(restored)?;
            self.recovery = None;
            return Ok(None);
        };

        self.acquire_lock()?;
        let restored = self.offline.restore_snapshot();
        self.check_offline(restored)?;
        self.recovery = None;
        self.working = Some(snapshot.payload.clone());
        self.revision += 1;

        self.notice(
            NoticeKind::Info,
            "Offline Changes Restored: Your unsynced changes are back in the sheet.",
        );
        self.emit(SessionEvent::Restored {
            captured_at: snapshot.captured_at,
        });
        Ok(Some(snapshot.payload))
    }

    /// Throw the unsynced snapshot away.
    pub fn discard_snapshot(&mut self) -> Result<()> {
        let discarded = self.offline.discard_snapshot();
        self.check_offline(discarded)?;
        self.recovery = None;
        self.notice(
            NoticeKind::Info,
            "Offline Changes Discarded: Unsynced changes were removed.",
        );
        self.emit(SessionEvent::SnapshotDiscarded);
        Ok(())
    }

    // === Commit ===

    /// First half of a commit: check that saving is possible and hand out
    /// what to publish. Nothing is changed besides renewing the lock.
    pub fn prepare_commit(&mut self) -> Result<PendingCommit> {
        if !self.offline.online() {
            return Err(SdkError::NotConnected);
        }
        if self.working.is_none() {
            return Err(SdkError::NothingToCommit);
        }
        self.record_activity()?;
        let payload = self.working.clone().ok_or(SdkError::NothingToCommit)?;
        Ok(PendingCommit {
            document: self.document().clone(),
            user: self.user().clone(),
            payload,
            revision: self.revision,
        })
    }

    /// Second half of a commit, applied once the publish has completed.
    ///
    /// The snapshot and lock are only let go if the published content is
    /// still the working copy and the session is still online. Otherwise
    /// the newer edits stay and [`SdkError::CommitSuperseded`] is returned.
    pub fn finish_commit(
        &mut self,
        pending: &PendingCommit,
        outcome: std::result::Result<(), PublishError>,
    ) -> Result<()> {
        if let Err(e) = outcome {
            warn!(document = %self.document(), error = %e, "publish failed");
            self.notice(NoticeKind::Error, &format!("Save Failed: {}", e));
            return Err(e.into());
        }

        if pending.revision != self.revision || !self.offline.online() {
            warn!(
                document = %self.document(),
                user = %self.user(),
                published = pending.revision,
                current = self.revision,
                online = self.offline.online(),
                "commit superseded, keeping newer edits"
            );
            self.notice(
                NoticeKind::Warning,
                "Newer Changes Pending: Your latest edits arrived while saving and were kept. Save again to publish them.",
            );
            self.emit(SessionEvent::CommitSuperseded);
            return Err(SdkError::CommitSuperseded);
        }

        let cleared = self.offline.clear_snapshot();
        self.check_offline(cleared)?;
        let released = self.lock.release();
        self.check_lock(released)?;
        self.working = None;
        self.recovery = None;
        self.drain_lock_events();

        info!(document = %self.document(), user = %self.user(), "changes committed");
        self.notice(
            NoticeKind::Info,
            "Changes Saved: Your changes were saved and the sheet is unlocked.",
        );
        self.emit(SessionEvent::Committed);
        self.wake.notify_one();
        Ok(())
    }

    // === Scheduling ===

    /// Re-evaluate every deadline: lock warning and expiry, offline grace,
    /// and the periodic offline snapshot.
    pub fn tick(&mut self) -> Result<()> {
        let mut first_error = None;

        match self.lock.poll() {
            Ok(events) => {
                for event in events {
                    self.handle_lock_event(event);
                }
            }
            Err(e) => first_error = Some(self.lock_failed(e)),
        }

        for event in self.offline.poll() {
            self.handle_offline_event(event);
        }

        if self.autosave_active() && self.offline.autosave_due() {
            if let Err(e) = self.save_working() {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// How long the scheduler may sleep before [`tick`](Self::tick) is needed
    /// again. `None` means nothing is being watched.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let now = self.clock.now_ms();
        let deadline = [
            self.lock.next_deadline(),
            self.offline.next_deadline(self.autosave_active()),
        ]
            .into_iter()
            .flatten()
            .min()?;
        let delay = deadline.saturating_sub(now);
        let delay = if self.lock.record().is_locked() {
            delay.min(self.poll_interval_ms)
        } else {
            delay
        };
        Some(Duration::from_millis(delay))
    }

    /// Render the current state.
    pub fn view(&self) -> SessionView {
        let now = self.clock.now_ms();
        SessionView {
            document: self.document().clone(),
            user: self.user().clone(),
            lock_state: self.lock.state(),
            holder: self.lock.holder().cloned(),
            remaining_ms: self.lock.query_remaining(now),
            warning_pending: self.lock.warning_pending(),
            can_edit: self.lock.is_held_by_self() && !self.offline.is_suspended(),
            offline_state: self.offline.state(),
            offline_remaining_ms: self.offline.offline_remaining_ms(),
            recovery: self.recovery.clone(),
        }
    }

    // === Internals ===

    fn ensure_writable(&self) -> Result<()> {
        if self.offline.is_suspended() {
            return Err(SdkError::EditingSuspended);
        }
        if !self.lock.is_held_by_self() {
            return Err(SdkError::ReadOnly {
                holder: self.lock.holder().cloned(),
            });
        }
        Ok(())
    }

    fn acquire_lock(&mut self) -> Result<Acquisition> {
        let result = self.lock.acquire();
        self.drain_lock_events();
        match result {
            Ok(acquisition) => {
                if !acquisition.reentrant {
                    let timeout = format_remaining(self.lock.config().lock_timeout_ms);
                    self.notice(
                        NoticeKind::Info,
                        &format!(
                            "Edit Mode Enabled: You have exclusive editing access. The lock is released after {} of inactivity.",
                            timeout
                        ),
                    );
                }
                self.emit(SessionEvent::EditingStarted {
                    reentrant: acquisition.reentrant,
                });
                self.wake.notify_one();
                Ok(acquisition)
            }
            Err(e) => Err(self.lock_failed(e)),
        }
    }

    /// Periodic snapshots only run while there is held content to save.
    fn autosave_active(&self) -> bool {
        self.lock.is_held_by_self() && self.working.is_some()
    }

    fn save_working(&mut self) -> Result<Option<Timestamp>> {
        let Some(payload) = self.working.clone() else {
            return Ok(None);
        };
        let saved = self.offline.save_snapshot(payload);
        match self.check_offline(saved)? {
            SaveOutcome::Saved { captured_at } => {
                self.emit(SessionEvent::SnapshotSaved { captured_at });
                self.wake.notify_one();
                Ok(Some(captured_at))
            }
            SaveOutcome::Skipped => Ok(None),
        }
    }

    /// Offer recovery if the editor is idle and a snapshot exists.
    fn check_idle_recovery(&mut self) {
        if self.lock.is_held_by_self() {
            return;
        }
        match self.offline.check_recovery(false) {
            Ok(Some(snapshot)) => {
                let already_offered = self
                    .recovery
                    .as_ref()
                    .is_some_and(|prompt| prompt.captured_at == snapshot.captured_at);
                if !already_offered {
                    let prompt = RecoveryPrompt::new(snapshot.captured_at);
                    self.notice(
                        NoticeKind::Info,
                        &format!("Unsynced Changes: {}", prompt.message()),
                    );
                    self.emit(SessionEvent::RecoveryPending {
                        captured_at: snapshot.captured_at,
                    });
                    self.recovery = Some(prompt);
                }
            }
            Ok(None) => self.recovery = None,
            Err(e) => self.storage_failed(&e.to_string()),
        }
    }

    fn drain_lock_events(&mut self) {
        for event in self.lock.take_events() {
            self.handle_lock_event(event);
        }
    }

    fn handle_lock_event(&mut self, event: LockEvent) {
        debug!(session = %self.session_id, ?event, "lock event");
        let mut went_idle = false;
        match event {
            LockEvent::WarningRaised { remaining_ms } => {
                // Renewed since it was raised.
                if !self.lock.warning_pending() {
                    return;
                }
                self.notice(
                    NoticeKind::Warning,
                    &format!(
                        "Session Expiring: Your editing session expires in {} due to inactivity. Continue editing or discard your changes.",
                        format_remaining(remaining_ms)
                    ),
                );
                self.emit(SessionEvent::WarningRaised { remaining_ms });
            }
            LockEvent::WarningCleared => self.emit(SessionEvent::WarningCleared),
            LockEvent::Expired { .. } => {
                self.working = None;
                self.notice(
                    NoticeKind::Warning,
                    "Session Expired: Your editing session expired due to inactivity. Changes have been discarded.",
                );
                self.emit(SessionEvent::LockExpired);
                went_idle = true;
            }
            LockEvent::ReleasedElsewhere => {
                self.working = None;
                self.notice(
                    NoticeKind::Info,
                    "Edit Mode Disabled: The lock was released from another window.",
                );
                self.emit(SessionEvent::LockLost { holder: None });
                went_idle = true;
            }
            LockEvent::LostToOther { holder } => {
                self.working = None;
                self.notice(
                    NoticeKind::Error,
                    &format!(
                        "Sheet Currently Locked: {} is now editing. You are in read-only mode.",
                        holder
                    ),
                );
                self.emit(SessionEvent::LockLost {
                    holder: Some(holder),
                });
                went_idle = true;
            }
        }
        if went_idle {
            self.check_idle_recovery();
        }
    }

    fn handle_offline_event(&mut self, event: OfflineEvent) {
        debug!(session = %self.session_id, ?event, "offline event");
        match event {
            OfflineEvent::ConnectionLost { .. } => {
                self.notice(
                    NoticeKind::Warning,
                    &format!(
                        "Connection Lost: You're offline. Changes will be saved locally for up to {}.",
                        format_remaining(self.offline.config().grace_ms)
                    ),
                );
                self.emit(SessionEvent::ConnectionLost);
                if self.lock.is_held_by_self() {
                    // Failure already reported.
                    let _ = self.save_working();
                }
            }
            OfflineEvent::ConnectionRestored { offline_for_ms } => {
                self.notice(
                    NoticeKind::Info,
                    "Connection Restored: You're back online. Changes can now be synced.",
                );
                self.emit(SessionEvent::ConnectionRestored { offline_for_ms });
            }
            OfflineEvent::GraceExpired => {
                self.notice(
                    NoticeKind::Error,
                    "Offline Session Expired: Offline editing time limit reached. Reconnect to continue editing.",
                );
                self.emit(SessionEvent::OfflineExpired);
                self.suspend_editing();
            }
        }
    }

    /// Offline grace ran out: give up the lock the same way an expiry would.
    /// The snapshot stays for recovery.
    fn suspend_editing(&mut self) {
        self.working = None;
        match self.lock.release() {
            Ok(true) => self.emit(SessionEvent::LockReleased),
            Ok(false) => {}
            Err(e) => {
                self.lock_failed(e);
            }
        }
        self.drain_lock_events();
        self.check_idle_recovery();
    }

    fn check_lock<T>(&mut self, result: sheetlock_lock::Result<T>) -> Result<T> {
        result.map_err(|e| self.lock_failed(e))
    }

    fn check_offline<T>(&mut self, result: sheetlock_offline::Result<T>) -> Result<T> {
        result.map_err(|e| {
            if let OfflineError::Persistence(store) = &e {
                self.storage_failed(&storage_message(store));
            }
            SdkError::Offline(e)
        })
    }

    /// Report a lock failure to the user and convert it.
    fn lock_failed(&mut self, error: LockError) -> SdkError {
        match &error {
            LockError::Conflict { holder } => {
                self.notice(
                    NoticeKind::Error,
                    &format!(
                        "Sheet Currently Locked: {} is editing. You are in read-only mode.",
                        holder
                    ),
                );
                self.emit(SessionEvent::LockConflict {
                    holder: holder.clone(),
                });
            }
            LockError::Storage(store) => self.storage_failed(&storage_message(store)),
            LockError::SessionExpired => self.notice(
                NoticeKind::Warning,
                "Session Expired: The lock is no longer yours. Enter edit mode again to continue.",
            ),
            LockError::Contended | LockError::InvalidConfig(_) => {
                self.notice(NoticeKind::Error, &error.to_string())
            }
        }
        SdkError::Lock(error)
    }

    fn storage_failed(&mut self, message: &str) {
        warn!(session = %self.session_id, document = %self.document(), message, "storage failure");
        self.notice(
            NoticeKind::Error,
            &format!("Storage Error: Unable to save changes locally. {}", message),
        );
        self.emit(SessionEvent::StorageFailed {
            message: message.to_string(),
        });
    }

    fn notice(&self, kind: NoticeKind, message: &str) {
        self.notifier.notify(kind, message);
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }
}

fn storage_message(error: &StoreError) -> String {
    match error {
        StoreError::QuotaExceeded { .. } => "Local storage is full.".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use serde_json::json;
    use sheetlock_core::{ManualClock, MemoryStore};

    const MIN: u64 = 60_000;

    struct Fixture {
        store: MemoryStore,
        clock: ManualClock,
        notifier: MemoryNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                clock: ManualClock::new(1_700_000_000_000),
                notifier: MemoryNotifier::new(),
            }
        }

        fn open(&self, user: &str, online: bool) -> EditSession<MemoryStore, ManualClock> {
            EditSession::new(
                self.store.clone(),
                self.clock.clone(),
                DocumentId::new("X"),
                UserId::new(user),
                EditorConfig::default(),
                Arc::new(self.notifier.clone()),
                online,
            )
            .unwrap()
        }
    }

    #[test]
    fn test_begin_editing_and_edit() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        let mut events = session.subscribe();

        let acquisition = session.begin_editing().unwrap();
        assert!(!acquisition.reentrant);
        session.edit(json!({"A1": 1})).unwrap();

        assert!(session.is_held_by_self());
        assert_eq!(session.working_copy(), Some(&json!({"A1": 1})));
        assert!(fx.notifier.contains(NoticeKind::Info, "Edit Mode Enabled"));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::EditingStarted { reentrant: false }
        );
    }

    #[test]
    fn test_conflict_is_read_only() {
        let fx = Fixture::new();
        let mut a = fx.open("A", true);
        let mut b = fx.open("B", true);

        a.begin_editing().unwrap();
        let result = b.begin_editing();

        assert!(matches!(
            result,
            Err(SdkError::Lock(LockError::Conflict { ref holder })) if holder.as_str() == "A"
        ));
        assert!(b.is_held_by_other());
        assert!(fx.notifier.contains(NoticeKind::Error, "Sheet Currently Locked: A"));
        assert!(matches!(
            b.edit(json!(1)),
            Err(SdkError::ReadOnly { holder: Some(_) })
        ));
    }

    #[test]
    fn test_expiry_drops_working_copy() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.edit(json!({"A1": 1})).unwrap();

        fx.clock.advance(10 * MIN);
        session.tick().unwrap();

        assert!(!session.is_held_by_self());
        assert!(session.working_copy().is_none());
        assert!(fx.notifier.contains(NoticeKind::Warning, "Session Expired"));
    }

    #[test]
    fn test_warning_then_continue() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();

        fx.clock.advance(9 * MIN);
        session.tick().unwrap();
        assert!(session.warning_pending());
        assert!(fx.notifier.contains(NoticeKind::Warning, "expires in 01:00"));

        session.continue_editing().unwrap();
        assert!(!session.warning_pending());
        assert_eq!(session.remaining_ms().unwrap(), 10 * MIN);
    }

    #[test]
    fn test_edit_during_warning_clears_it() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        fx.clock.advance(9 * MIN + 1_000);
        session.tick().unwrap();
        let mut events = session.subscribe();

        session.edit(json!({"A1": 2})).unwrap();

        assert!(!session.warning_pending());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::WarningCleared);
    }

    #[test]
    fn test_offline_edits_are_snapshotted() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.edit(json!({"A1": 1})).unwrap();

        session.on_connectivity_change(false);
        assert!(fx.notifier.contains(NoticeKind::Warning, "Connection Lost"));
        assert!(fx.store.keys().contains(&"offline:X:A".to_string()));

        session.edit(json!({"A1": 2})).unwrap();
        session.on_connectivity_change(true);
        assert!(fx.notifier.contains(NoticeKind::Info, "Connection Restored"));
        assert_eq!(session.working_copy(), Some(&json!({"A1": 2})));
    }

    #[test]
    fn test_grace_expiry_suspends_and_offers_recovery() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.on_connectivity_change(false);
        session.edit(json!({"A1": 3})).unwrap();

        fx.clock.advance(5 * MIN);
        session.record_activity().unwrap();
        fx.clock.advance(5 * MIN);
        session.tick().unwrap();

        assert_eq!(session.offline_state(), OfflineState::OfflineExpired {
            since: 1_700_000_000_000
        });
        assert!(!session.is_held_by_self());
        assert!(session.has_pending_recovery());
        assert!(matches!(session.edit(json!(0)), Err(SdkError::EditingSuspended)));
        assert!(matches!(session.begin_editing(), Err(SdkError::EditingSuspended)));
        assert!(fx.notifier.contains(NoticeKind::Error, "Offline Session Expired"));
    }

    #[test]
    fn test_recovery_blocks_editing_until_answered() {
        let fx = Fixture::new();
        {
            let mut first = fx.open("A", false);
            first.begin_editing().unwrap();
            first.edit(json!({"A1": "offline"})).unwrap();
        }

        let mut session = fx.open("A", true);
        // The old tab still holds the lock record for A, which is ours.
        assert!(session.is_held_by_self());
        session.release().unwrap();
        assert!(session.has_pending_recovery());
        assert!(matches!(session.begin_editing(), Err(SdkError::RecoveryPending)));

        let payload = session.restore_snapshot().unwrap();
        assert_eq!(payload, Some(json!({"A1": "offline"})));
        assert!(session.is_held_by_self());
        assert!(!session.has_pending_recovery());
    }

    #[test]
    fn test_restore_against_foreign_lock_keeps_recovery_pending() {
        let fx = Fixture::new();
        {
            let mut first = fx.open("A", false);
            first.begin_editing().unwrap();
            first.edit(json!({"A1": 1})).unwrap();
            first.release().unwrap();
        }
        let mut a = fx.open("A", true);
        assert!(a.has_pending_recovery());

        let mut b = fx.open("B", true);
        b.begin_editing().unwrap();

        assert!(matches!(
            a.restore_snapshot(),
            Err(SdkError::Lock(LockError::Conflict { .. }))
        ));
        assert!(a.has_pending_recovery());

        a.discard_snapshot().unwrap();
        assert!(!a.has_pending_recovery());
        assert!(!fx.store.keys().contains(&"offline:X:A".to_string()));
    }

    #[test]
    fn test_recovery_prompt_formats_local_time() {
        let prompt = RecoveryPrompt::new(1_700_000_000_000);
        assert!(prompt.captured_at_local.starts_with("2023-11-1"));
        assert!(prompt.message().contains(&prompt.captured_at_local));
    }

    #[test]
    fn test_snapshot_failure_is_reported() {
        let fx = Fixture {
            store: MemoryStore::with_quota(256),
            ..Fixture::new()
        };
        let mut session = fx.open("A", false);
        session.begin_editing().unwrap();

        let result = session.edit(json!({"A1": "x".repeat(1024)}));

        assert!(matches!(result, Err(SdkError::Offline(OfflineError::Persistence(_)))));
        assert!(fx.notifier.contains(NoticeKind::Error, "Local storage is full"));
        // The lock itself is unaffected.
        assert!(session.is_held_by_self());
    }

    #[test]
    fn test_discard_and_release_drops_everything() {
        let fx = Fixture::new();
        let mut session = fx.open("A", false);
        session.begin_editing().unwrap();
        session.edit(json!({"A1": 1})).unwrap();

        session.discard_and_release().unwrap();

        assert!(!session.is_held_by_self());
        assert!(session.working_copy().is_none());
        assert!(fx.store.keys().iter().all(|key| !key.starts_with("offline:")));
        assert!(!session.has_pending_recovery());
    }

    #[test]
    fn test_next_wakeup() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        assert_eq!(session.next_wakeup(), None);

        session.begin_editing().unwrap();
        assert_eq!(session.next_wakeup(), Some(Duration::from_millis(1_000)));

        session.on_connectivity_change(false);
        assert!(session.next_wakeup().is_some());
    }

    #[test]
    fn test_release_while_offline_does_not_spin_the_scheduler() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.on_connectivity_change(false);
        session.edit(json!({"A1": 1})).unwrap();
        session.release().unwrap();

        fx.clock.advance(6_000);
        for _ in 0..5 {
            session.tick().unwrap();
            assert_ne!(session.next_wakeup(), Some(Duration::ZERO));
            fx.clock.advance(100);
        }
        // Only the grace countdown is left to watch.
        assert_eq!(
            session.next_wakeup(),
            Some(Duration::from_millis(10 * MIN - 6_500))
        );
    }

    #[test]
    fn test_release_notifies() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        let mut events = session.subscribe();

        assert!(session.release().unwrap());

        assert!(fx.notifier.contains(NoticeKind::Info, "Edit Mode Disabled"));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LockReleased);
    }

    #[test]
    fn test_edit_during_publish_survives_commit() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.edit(json!({"v": 1})).unwrap();

        let pending = session.prepare_commit().unwrap();
        assert_eq!(pending.payload, json!({"v": 1}));

        // While the publish is in flight the connection drops and the user
        // keeps typing.
        session.on_connectivity_change(false);
        session.edit(json!({"v": 2})).unwrap();

        let result = session.finish_commit(&pending, Ok(()));

        assert_eq!(result, Err(SdkError::CommitSuperseded));
        assert_eq!(session.working_copy(), Some(&json!({"v": 2})));
        assert!(session.is_held_by_self());
        assert!(fx.store.keys().contains(&"offline:X:A".to_string()));
        assert!(fx.notifier.contains(NoticeKind::Warning, "Newer Changes Pending"));
    }

    #[test]
    fn test_commit_superseded_while_offline_keeps_everything() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        session.edit(json!({"v": 1})).unwrap();

        let pending = session.prepare_commit().unwrap();
        session.on_connectivity_change(false);

        assert_eq!(
            session.finish_commit(&pending, Ok(())),
            Err(SdkError::CommitSuperseded)
        );
        assert!(session.is_held_by_self());
        assert_eq!(session.working_copy(), Some(&json!({"v": 1})));
    }

    #[test]
    fn test_unchanged_commit_clears_snapshot_and_lock() {
        let fx = Fixture::new();
        let mut session = fx.open("A", false);
        session.begin_editing().unwrap();
        session.edit(json!({"v": 1})).unwrap();
        session.on_connectivity_change(true);

        let pending = session.prepare_commit().unwrap();
        session.finish_commit(&pending, Ok(())).unwrap();

        assert!(!session.is_held_by_self());
        assert!(session.working_copy().is_none());
        assert!(fx.store.keys().iter().all(|key| !key.starts_with("offline:")));
    }

    #[test]
    fn test_view() {
        let fx = Fixture::new();
        let mut session = fx.open("A", true);
        session.begin_editing().unwrap();
        fx.clock.advance(MIN);

        let view = session.view();
        assert_eq!(view.lock_state, LockState::EditingSelf);
        assert_eq!(view.remaining_label(), "09:00");
        assert!(view.can_edit);
        assert!(view.online());
        assert!(!view.has_pending_recovery());
    }
}
