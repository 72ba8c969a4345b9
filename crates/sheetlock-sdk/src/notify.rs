//! User notification sinks.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Severity of a user notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Where user-facing notices go (toasts, banners, a terminal...).
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, kind: NoticeKind, message: &str) {
        (**self).notify(kind, message)
    }
}

/// Forwards notices to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Info => info!(target: "sheetlock::notice", "{}", message),
            NoticeKind::Warning => warn!(target: "sheetlock::notice", "{}", message),
            NoticeKind::Error => error!(target: "sheetlock::notice", "{}", message),
        }
    }
}

/// Records notices in memory. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct MemoryNotifier {
    notices: Arc<Mutex<Vec<(NoticeKind, String)>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().clone()
    }

    /// Check if a notice of `kind` containing `needle` was recorded.
    pub fn contains(&self, kind: NoticeKind, needle: &str) -> bool {
        self.notices
            .lock()
            .iter()
            .any(|(k, message)| *k == kind && message.contains(needle))
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().push((kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier() {
        let notifier = MemoryNotifier::new();
        let shared = notifier.clone();

        shared.notify(NoticeKind::Warning, "Session expires in 01:00");

        assert!(notifier.contains(NoticeKind::Warning, "expires"));
        assert!(!notifier.contains(NoticeKind::Error, "expires"));
        assert_eq!(notifier.notices().len(), 1);

        notifier.clear();
        assert!(shared.notices().is_empty());
    }
}
