//! Identity types.

use serde::{Deserialize, Serialize};

/// Document id used when a deployment only has a single editable sheet.
pub const DEFAULT_DOCUMENT_ID: &str = "pipeline_2025_q3";

/// Unique identifier for a user. Authentication happens elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an editable sheet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_ID)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Escape an id for use as one `:`-separated part of a storage key.
pub(crate) fn key_component(id: &str) -> std::borrow::Cow<'_, str> {
    if id.contains(['%', ':']) {
        id.replace('%', "%25").replace(':', "%3A").into()
    } else {
        id.into()
    }
}
