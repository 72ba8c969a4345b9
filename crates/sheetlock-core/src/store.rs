//! Persistence port and implementations.
//!
//! The [`Store`] is the single shared medium every viewer reads and writes.
//! It is a plain keyed blob store; records are serialized as flat JSON.
//! Implementations backed by a server can provide a real atomic
//! [`Store::compare_and_set`]; the default one is read-compare-write and
//! therefore last-write-wins across viewers.

use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keyed blob storage shared by all viewers of a document.
pub trait Store: Send + Sync {
    /// Read the blob under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob under `key`.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete the blob under `key`. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// Write `new` only if the current blob equals `expected`
    /// (`None` meaning absent). Returns whether the write happened.
    ///
    /// The default implementation is not atomic.
    fn compare_and_set(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        let current = self.get(key)?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, new)?;
        Ok(true)
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn compare_and_set(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        (**self).compare_and_set(key, expected, new)
    }
}

/// Typed JSON helpers over any [`Store`].
pub trait StoreExt: Store {
    /// Read and decode a JSON record.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt(key, e.to_string())),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON record, replacing the previous one.
    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = encode(key, value)?;
        self.set(key, &bytes)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Encode a record the way [`StoreExt::put_json`] does.
pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::corrupt(key, e.to_string()))
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-memory store. Clones share the same entries, so several viewers in
/// one process can be given clones of a single store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once the total stored bytes would exceed
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                quota: Some(quota_bytes),
                ..Default::default()
            }),
        }
    }

    /// Make every read fail with [`StoreError::Unavailable`].
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write and delete fail with [`StoreError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_reads(&self) -> Result<()> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn insert_checked(
        &self,
        entries: &mut HashMap<String, Vec<u8>>,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        if let Some(quota) = self.inner.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(others);
            if value.len() > available {
                warn!(key, needed = value.len(), available, "store quota exceeded");
                return Err(StoreError::QuotaExceeded {
                    needed: value.len(),
                    available,
                });
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_reads()?;
        Ok(self.inner.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_writes()?;
        let mut entries = self.inner.entries.lock();
        self.insert_checked(&mut entries, key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writes()?;
        self.inner.entries.lock().remove(key);
        Ok(())
    }

    /// Atomic: the comparison and the write happen under one lock.
    fn compare_and_set(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        self.check_reads()?;
        self.check_writes()?;
        let mut entries = self.inner.entries.lock();
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        self.insert_checked(&mut entries, key, new)?;
        Ok(true)
    }
}

/// Distinguishes concurrent writes within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory-backed store: one file per key.
///
/// Writes go to a temporary file that is renamed over the target, so
/// readers in other processes see either the old or the new record.
/// `compare_and_set` uses the non-atomic default.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root.to_string_lossy(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let target = self.path_for(key);
        let tmp = target.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            warn!(key, path = %target.display(), error = %e, "file store write failed");
            StoreError::io(key, e)
        })?;
        debug!(key, bytes = value.len(), "file store write");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}

/// Escape a key into a file name: ASCII alphanumerics, `-` and `_` are kept,
/// everything else becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
