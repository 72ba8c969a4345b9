//! The per-viewer lock state machine.
//!
//! A [`LockManager`] is bound to one (document, user) pair. It caches the
//! last record it read, but every operation re-reads the store first and
//! evaluates expiry against the fresh value before acting. Writes go through
//! [`Store::compare_and_set`] against the bytes just read, so a record that
//! changed in between is re-read instead of overwritten.

use crate::config::LockConfig;
use crate::error::{LockError, Result};
use sheetlock_core::store::encode;
use sheetlock_core::{Clock, DocumentId, LockRecord, Store, Timestamp, UserId};
use tracing::{debug, info, warn};

/// Write attempts before an update gives up with [`LockError::Contended`].
const MAX_ATTEMPTS: usize = 3;

/// The lock as observed by one viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    /// Nobody holds the lock.
    Unlocked,
    /// This viewer holds the lock.
    EditingSelf,
    /// This viewer holds the lock and is close to expiry.
    WarningPending,
    /// Someone else holds a live lock; the sheet is read-only here.
    LockedByOther { holder: UserId },
}

/// Transitions that happened without a direct action from this viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockEvent {
    /// The idle warning threshold was crossed. Raised once per renewal.
    WarningRaised { remaining_ms: u64 },
    /// The pending warning was cleared by a renewal from elsewhere.
    WarningCleared,
    /// Our lock timed out and was cleared.
    Expired { holder: UserId },
    /// Our lock was released by another tab of the same user.
    ReleasedElsewhere,
    /// Our lock was replaced by another holder.
    LostToOther { holder: UserId },
}

/// Result of a successful [`LockManager::acquire`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acquisition {
    pub at: Timestamp,
    /// The lock was already ours; the acquire acted as a renewal.
    pub reentrant: bool,
}

enum Step<T> {
    Write(LockRecord, T),
    Done(T),
}

/// Session lock manager for one viewer of one document.
pub struct LockManager<S: Store, C: Clock> {
    store: S,
    clock: C,
    document: DocumentId,
    user: UserId,
    config: LockConfig,
    key: String,
    record: LockRecord,
    held: bool,
    warning_pending: bool,
    /// Renewal instant the last warning was raised for.
    warned_epoch: Option<Timestamp>,
    pending: Vec<LockEvent>,
}

impl<S: Store, C: Clock> LockManager<S, C> {
    /// Create a manager and sweep an already-expired record out of the store.
    pub fn new(
        store: S,
        clock: C,
        document: DocumentId,
        user: UserId,
        config: LockConfig,
    ) -> Result<Self> {
        config.validate()?;
        let key = LockRecord::storage_key(&document);

        let mut manager = Self {
            store,
            clock,
            document,
            user,
            config,
            key,
            record: LockRecord::unlocked(),
            held: false,
            warning_pending: false,
            warned_epoch: None,
            pending: Vec::new(),
        };

        let now = manager.clock.now_ms();
        manager.observe(now)?;
        if manager.held {
            info!(document = %manager.document, user = %manager.user, "resuming held lock");
        }

        Ok(manager)
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// The record as of the last observation.
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn holder(&self) -> Option<&UserId> {
        self.record.holder()
    }

    // === Commands ===

    /// Take the lock, or renew it if this user already holds it.
    pub fn acquire(&mut self) -> Result<Acquisition> {
        let user = self.user.clone();
        let result = self.update(|record, now| {
            if let Some(holder) = record.holder().filter(|holder| **holder != user) {
                return Err(LockError::Conflict {
                    holder: holder.clone(),
                });
            }
            let acquisition = Acquisition {
                at: now,
                reentrant: record.is_held_by(&user),
            };
            Ok(Step::Write(LockRecord::held_by(user.clone(), now), acquisition))
        });

        match &result {
            Ok(acquisition) => info!(
                document = %self.document,
                user = %self.user,
                at = acquisition.at,
                reentrant = acquisition.reentrant,
                "lock acquired"
            ),
            Err(LockError::Conflict { holder }) => warn!(
                document = %self.document,
                user = %self.user,
                holder = %holder,
                "lock held by another user"
            ),
            Err(e) => warn!(document = %self.document, user = %self.user, error = %e, "lock acquisition failed"),
        }
        result
    }

    /// Clear the lock if this user holds it. Returns whether anything was
    /// released; a non-holder call is a no-op.
    pub fn release(&mut self) -> Result<bool> {
        let user = self.user.clone();
        let released = self.update(|record, _| {
            Ok(if record.is_held_by(&user) {
                Step::Write(LockRecord::unlocked(), true)
            } else {
                Step::Done(false)
            })
        })?;

        if released {
            info!(document = %self.document, user = %self.user, "lock released");
        }
        Ok(released)
    }

    /// Reset the inactivity countdown. No-op unless this user holds the lock.
    pub fn renew(&mut self) -> Result<bool> {
        let user = self.user.clone();
        let renewed = self.update(|record, now| {
            Ok(if record.is_held_by(&user) {
                Step::Write(record.renewed(now), true)
            } else {
                Step::Done(false)
            })
        })?;

        if renewed {
            debug!(document = %self.document, user = %self.user, "lock renewed");
        }
        Ok(renewed)
    }

    /// Answer the expiry warning by continuing to edit.
    pub fn continue_editing(&mut self) -> Result<()> {
        if self.renew()? {
            Ok(())
        } else {
            Err(LockError::SessionExpired)
        }
    }

    /// Answer the expiry warning by giving up the lock.
    pub fn discard_and_release(&mut self) -> Result<bool> {
        self.warning_pending = false;
        self.release()
    }

    // === Observation ===

    /// Re-read the store, apply expiry and warning transitions, and return
    /// every transition observed since the last call.
    pub fn poll(&mut self) -> Result<Vec<LockEvent>> {
        let now = self.clock.now_ms();
        self.observe(now)?;
        Ok(self.take_events())
    }

    /// Drain transitions collected during earlier operations.
    pub fn take_events(&mut self) -> Vec<LockEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Re-read the store and return the fresh state.
    pub fn refresh(&mut self) -> Result<LockState> {
        let now = self.clock.now_ms();
        self.observe(now)?;
        Ok(self.state())
    }

    /// Milliseconds left before the current lock expires, re-read from the
    /// store.
    pub fn remaining_ms(&mut self) -> Result<u64> {
        let now = self.clock.now_ms();
        self.observe(now)?;
        Ok(self.query_remaining(now))
    }

    /// Milliseconds left at `now` according to the cached record.
    pub fn query_remaining(&self, now: Timestamp) -> u64 {
        self.record.remaining_ms(now, self.config.lock_timeout_ms)
    }

    /// State as of the last observation.
    pub fn state(&self) -> LockState {
        match self.record.holder() {
            None => LockState::Unlocked,
            Some(holder) if *holder == self.user => {
                if self.warning_pending {
                    LockState::WarningPending
                } else {
                    LockState::EditingSelf
                }
            }
            Some(holder) => LockState::LockedByOther {
                holder: holder.clone(),
            },
        }
    }

    pub fn is_held_by_self(&self) -> bool {
        self.held
    }

    pub fn is_held_by_other(&self) -> bool {
        self.record.is_held_by_other(&self.user)
    }

    pub fn warning_pending(&self) -> bool {
        self.warning_pending
    }

    /// When the next warning or expiry transition is due, if any.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let at = self.record.acquired_at()?;
        if self.held && self.warned_epoch != Some(at) {
            Some(at.saturating_add(self.config.warning_threshold_ms()))
        } else {
            Some(at.saturating_add(self.config.lock_timeout_ms))
        }
    }

    // === Internals ===

    /// Read the raw bytes and the decoded record. An undecodable or
    /// inconsistent record reads as unlocked and is replaced on the next
    /// write.
    fn read(&self) -> Result<(Option<Vec<u8>>, LockRecord)> {
        let raw = self.store.get(&self.key)?;
        let record = match raw.as_deref() {
            None => LockRecord::unlocked(),
            Some(bytes) => match serde_json::from_slice::<LockRecord>(bytes) {
                Ok(record) if record.is_consistent() => record,
                Ok(_) => {
                    warn!(key = %self.key, "inconsistent lock record, treating as unlocked");
                    LockRecord::unlocked()
                }
                Err(e) => {
                    warn!(key = %self.key, error = %e, "undecodable lock record, treating as unlocked");
                    LockRecord::unlocked()
                }
            },
        };
        Ok((raw, record))
    }

    /// Read the store, clear an expired record, and fold the result into the
    /// cached state. Returns the bytes currently stored.
    fn observe(&mut self, now: Timestamp) -> Result<Option<Vec<u8>>> {
        let timeout = self.config.lock_timeout_ms;
        let (mut raw, mut record) = self.read()?;

        if record.is_expired(now, timeout) {
            let cleared = encode(&self.key, &LockRecord::unlocked())?;
            if self
                .store
                .compare_and_set(&self.key, raw.as_deref(), &cleared)?
            {
                if let Some(holder) = record.holder() {
                    info!(document = %self.document, holder = %holder, "expired lock cleared");
                }
                raw = Some(cleared);
                record = LockRecord::unlocked();
            } else {
                // Someone rewrote it first; take their version.
                let (fresh_raw, fresh) = self.read()?;
                raw = fresh_raw;
                record = if fresh.is_expired(now, timeout) {
                    LockRecord::unlocked()
                } else {
                    fresh
                };
            }
        }

        self.absorb(record, now);
        Ok(raw)
    }

    fn absorb(&mut self, record: LockRecord, now: Timestamp) {
        let now_held = record.is_held_by(&self.user);

        if self.held && !now_held {
            match record.holder() {
                Some(other) => {
                    warn!(document = %self.document, user = %self.user, holder = %other, "lock taken over");
                    self.pending.push(LockEvent::LostToOther {
                        holder: other.clone(),
                    });
                }
                None if self.record.is_expired(now, self.config.lock_timeout_ms) => {
                    info!(document = %self.document, user = %self.user, "editing session expired");
                    self.pending.push(LockEvent::Expired {
                        holder: self.user.clone(),
                    });
                }
                None => {
                    info!(document = %self.document, user = %self.user, "lock released elsewhere");
                    self.pending.push(LockEvent::ReleasedElsewhere);
                }
            }
        }

        if now_held {
            if record.elapsed_ms(now) >= self.config.warning_threshold_ms() {
                if self.warned_epoch != record.acquired_at() {
                    let remaining_ms = record.remaining_ms(now, self.config.lock_timeout_ms);
                    info!(document = %self.document, user = %self.user, remaining_ms, "lock about to expire");
                    self.warned_epoch = record.acquired_at();
                    self.warning_pending = true;
                    self.pending.push(LockEvent::WarningRaised { remaining_ms });
                }
            } else if self.warning_pending {
                self.warning_pending = false;
                self.pending.push(LockEvent::WarningCleared);
            }
        } else {
            self.warning_pending = false;
        }

        self.held = now_held;
        self.record = record;
    }

    /// Our own successful write.
    fn apply_local(&mut self, next: LockRecord) {
        self.held = next.is_held_by(&self.user);
        self.warning_pending = false;
        self.record = next;
    }

    /// Observe, decide on the fresh record, and write the decision with
    /// compare-and-set against the bytes just observed.
    fn update<T>(
        &mut self,
        mut decide: impl FnMut(&LockRecord, Timestamp) -> Result<Step<T>>,
    ) -> Result<T> {
        for attempt in 0..MAX_ATTEMPTS {
            let now = self.clock.now_ms();
            let raw = self.observe(now)?;

            match decide(&self.record, now)? {
                Step::Done(value) => return Ok(value),
                Step::Write(next, value) => {
                    let bytes = encode(&self.key, &next)?;
                    if self
                        .store
                        .compare_and_set(&self.key, raw.as_deref(), &bytes)?
                    {
                        self.apply_local(next);
                        return Ok(value);
                    }
                    debug!(document = %self.document, attempt, "lock record changed during update, retrying");
                }
            }
        }
        Err(LockError::Contended)
    }
}
