//! High-level client for the Sheetlock SDK.

use crate::config::EditorConfig;
use crate::error::Result;
use crate::notify::{Notifier, TracingNotifier};
use crate::session::EditSession;
use parking_lot::{Mutex, RwLock};
use sheetlock_core::{Clock, DocumentId, MemoryStore, Store, SystemClock, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A session shared between the UI, the [`Ticker`](crate::ticker::Ticker)
/// and [`commit`](crate::publish::commit).
pub type SharedSession<S, C> = Arc<Mutex<EditSession<S, C>>>;

/// One user's entry point: opens an [`EditSession`] per document, all on
/// the same store and clock.
///
/// # Example
///
/// ```rust
/// use sheetlock_sdk::{Client, EditorConfig};
///
/// let client = Client::new_with_memory_store("alice", EditorConfig::default());
/// let session = client.open_session("budget", true).unwrap();
///
/// session.lock().begin_editing().unwrap();
/// assert_eq!(client.session_ids().len(), 1);
///
/// client.close_session("budget").unwrap();
/// assert!(client.get_session("budget").is_none());
/// ```
pub struct Client<S: Store + Clone, C: Clock + Clone> {
    user: UserId,
    config: EditorConfig,
    store: S,
    clock: C,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<RwLock<HashMap<DocumentId, SharedSession<S, C>>>>,
}

impl Client<MemoryStore, SystemClock> {
    /// Create a client over a private in-memory store (for testing).
    pub fn new_with_memory_store(user: impl Into<String>, config: EditorConfig) -> Self {
        Self::new(
            UserId::new(user),
            MemoryStore::new(),
            SystemClock,
            Arc::new(TracingNotifier),
            config,
        )
    }
}

impl<S: Store + Clone, C: Clock + Clone> Client<S, C> {
    pub fn new(
        user: UserId,
        store: S,
        clock: C,
        notifier: Arc<dyn Notifier>,
        config: EditorConfig,
    ) -> Self {
        Self {
            user,
            config,
            store,
            clock,
            notifier,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open a document, or return the session already open for it.
    pub fn open_session(
        &self,
        document: impl Into<String>,
        online: bool,
    ) -> Result<SharedSession<S, C>> {
        let document = DocumentId::new(document);
        let mut sessions = self.sessions.write();

        if let Some(session) = sessions.get(&document) {
            return Ok(session.clone());
        }

        let session = Arc::new(Mutex::new(EditSession::new(
            self.store.clone(),
            self.clock.clone(),
            document.clone(),
            self.user.clone(),
            self.config.clone(),
            self.notifier.clone(),
            online,
        )?));
        sessions.insert(document, session.clone());
        Ok(session)
    }

    /// Get an existing session.
    pub fn get_session(&self, document: &str) -> Option<SharedSession<S, C>> {
        self.sessions.read().get(&DocumentId::new(document)).cloned()
    }

    /// Close a session, releasing its lock if held. Closing leaves any
    /// offline snapshot in place for the next session to recover.
    pub fn close_session(&self, document: &str) -> Result<()> {
        let removed = self.sessions.write().remove(&DocumentId::new(document));
        if let Some(session) = removed {
            let released = session.lock().release()?;
            info!(document, user = %self.user, released, "session closed");
        }
        Ok(())
    }

    /// List all open documents.
    pub fn session_ids(&self) -> Vec<DocumentId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Feed a connectivity signal to every open session.
    pub fn set_online(&self, online: bool) {
        for session in self.sessions.read().values() {
            session.lock().on_connectivity_change(online);
        }
    }
}

/// Convenience functions for quick setup.
pub mod quick {
    use super::*;

    /// Create one client per user, all sharing the same in-memory store and
    /// clock, like several browser tabs on one machine.
    pub fn create_viewers<C: Clock + Clone>(
        users: &[&str],
        clock: C,
        config: EditorConfig,
        notifier: Arc<dyn Notifier>,
    ) -> (MemoryStore, Vec<Client<MemoryStore, C>>) {
        let store = MemoryStore::new();
        let clients = users
            .iter()
            .map(|user| {
                Client::new(
                    UserId::new(*user),
                    store.clone(),
                    clock.clone(),
                    notifier.clone(),
                    config.clone(),
                )
            })
            .collect();
        (store, clients)
    }
}
