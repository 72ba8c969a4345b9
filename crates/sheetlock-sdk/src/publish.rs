//! Publishing committed edits.
//!
//! A commit is the only asynchronous operation of a session. The lock and
//! snapshot side effects are applied after the publish completes, so a commit
//! future dropped mid-flight leaves the session exactly as it was.

use crate::client::SharedSession;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use sheetlock_core::{Clock, DocumentId, Store, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a [`Publisher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publish rejected: {0}")]
    Rejected(String),

    #[error("Publish target unreachable: {0}")]
    Unreachable(String),
}

/// Destination for committed edits (the shared backend).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        document: &DocumentId,
        user: &UserId,
        payload: &serde_json::Value,
    ) -> std::result::Result<(), PublishError>;
}

/// In-memory publisher for testing, with optional simulated latency.
#[derive(Clone, Debug, Default)]
pub struct MemoryPublisher {
    published: Arc<Mutex<Vec<(DocumentId, UserId, serde_json::Value)>>>,
    latency: Duration,
    unreachable: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Make subsequent publishes fail with [`PublishError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<(DocumentId, UserId, serde_json::Value)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(
        &self,
        document: &DocumentId,
        user: &UserId,
        payload: &serde_json::Value,
    ) -> std::result::Result<(), PublishError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PublishError::Unreachable("memory publisher offline".into()));
        }
        self.published
            .lock()
            .push((document.clone(), user.clone(), payload.clone()));
        Ok(())
    }
}

/// Save the working copy: publish it, then release the lock and delete the
/// offline snapshot. Edits made while the publish was in flight are kept.
pub async fn commit<S, C, P>(session: &SharedSession<S, C>, publisher: &P) -> Result<()>
where
    S: Store + Clone,
    C: Clock + Clone,
    P: Publisher + ?Sized,
{
    let pending = session.lock().prepare_commit()?;
    debug!(document = %pending.document, user = %pending.user, "publishing");
    let outcome = publisher
        .publish(&pending.document, &pending.user, &pending.payload)
        .await;
    session.lock().finish_commit(&pending, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_publisher() {
        let publisher = MemoryPublisher::new();
        let doc = DocumentId::new("X");
        let user = UserId::new("A");

        publisher.publish(&doc, &user, &json!({"A1": 1})).await.unwrap();
        assert_eq!(publisher.published().len(), 1);

        publisher.set_unreachable(true);
        let result = publisher.publish(&doc, &user, &json!({"A1": 2})).await;
        assert!(matches!(result, Err(PublishError::Unreachable(_))));
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let publisher = MemoryPublisher::with_latency(Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        publisher
            .publish(&DocumentId::new("X"), &UserId::new("A"), &json!(null))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
