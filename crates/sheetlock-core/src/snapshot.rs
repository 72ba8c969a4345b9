//! Durable capture of edits made while disconnected.

use crate::clock::Timestamp;
use crate::ids::{key_component, DocumentId, UserId};
use serde::{Deserialize, Serialize};

/// A capture of unsynced edits for one (document, user) pair.
///
/// At most one snapshot is kept per pair; saving overwrites the previous one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfflineSnapshot {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub captured_at: Timestamp,
    /// Opaque document state, owned by the editor.
    pub payload: serde_json::Value,
}

impl OfflineSnapshot {
    pub fn new(
        document_id: DocumentId,
        user_id: UserId,
        captured_at: Timestamp,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            document_id,
            user_id,
            captured_at,
            payload,
        }
    }

    /// Storage key of the snapshot for a (document, user) pair. Each part is
    /// escaped so distinct pairs never share a key.
    pub fn storage_key(document: &DocumentId, user: &UserId) -> String {
        format!(
            "offline:{}:{}",
            key_component(document.as_str()),
            key_component(user.as_str())
        )
    }

    /// Check whether this snapshot belongs to the given pair.
    pub fn matches(&self, document: &DocumentId, user: &UserId) -> bool {
        &self.document_id == document && &self.user_id == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_scoped_per_user() {
        let doc = DocumentId::new("X");
        assert_ne!(
            OfflineSnapshot::storage_key(&doc, &UserId::new("A")),
            OfflineSnapshot::storage_key(&doc, &UserId::new("B"))
        );
        assert_eq!(
            OfflineSnapshot::storage_key(&doc, &UserId::new("A")),
            "offline:X:A"
        );
    }

    #[test]
    fn test_separator_in_ids_does_not_collide() {
        let first = OfflineSnapshot::storage_key(&DocumentId::new("a:b"), &UserId::new("c"));
        let second = OfflineSnapshot::storage_key(&DocumentId::new("a"), &UserId::new("b:c"));

        assert_ne!(first, second);
        assert_eq!(first, "offline:a%3Ab:c");
        assert_eq!(second, "offline:a:b%3Ac");
        assert_eq!(
            OfflineSnapshot::storage_key(&DocumentId::new("a%3Ab"), &UserId::new("c")),
            "offline:a%253Ab:c"
        );
    }

    #[test]
    fn test_matches() {
        let snapshot = OfflineSnapshot::new(
            DocumentId::new("X"),
            UserId::new("A"),
            10,
            json!({"rows": []}),
        );
        assert!(snapshot.matches(&DocumentId::new("X"), &UserId::new("A")));
        assert!(!snapshot.matches(&DocumentId::new("X"), &UserId::new("B")));
        assert!(!snapshot.matches(&DocumentId::new("Y"), &UserId::new("A")));
    }
}
