use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use accrue_types::Acl;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, StoredObject};

#[derive(Clone, Debug)]
struct Entry {
    body: Bytes,
    content_type: String,
    acl: Acl,
    last_modified: DateTime<Utc>,
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Besides the [`ObjectStore`] contract it
/// can simulate access-denied keys and failing backends so callers can
/// exercise their error paths.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Entry>>,
    denied: RwLock<HashSet<String>>,
    broken: RwLock<HashSet<String>>,
    undeletable: RwLock<HashSet<String>>,
    failing_puts: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            denied: RwLock::new(HashSet::new()),
            broken: RwLock::new(HashSet::new()),
            undeletable: RwLock::new(HashSet::new()),
            failing_puts: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().expect("lock poisoned").contains_key(key)
    }

    /// Body of `key` as text, bypassing access checks and fault injection.
    pub fn text(&self, key: &str) -> Option<String> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(key)
            .map(|e| String::from_utf8_lossy(&e.body).into_owned())
    }

    /// Content-type recorded for `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(key).map(|e| e.content_type.clone())
    }

    /// Access policy recorded for `key`.
    pub fn acl(&self, key: &str) -> Option<Acl> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(key).map(|e| e.acl.clone())
    }

    /// Answer every `get` of `key` with `AccessDenied`.
    pub fn deny(&self, key: impl Into<String>) {
        self.denied.write().expect("lock poisoned").insert(key.into());
    }

    /// Answer every `get` and `delete` of `key` with a backend failure.
    pub fn break_key(&self, key: impl Into<String>) {
        self.broken.write().expect("lock poisoned").insert(key.into());
    }

    /// Answer every `delete` of `key` with a backend failure. Reads and
    /// writes are unaffected.
    pub fn fail_deletes(&self, key: impl Into<String>) {
        self.undeletable.write().expect("lock poisoned").insert(key.into());
    }

    /// Fail the next `n` calls to `put`.
    pub fn fail_next_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// Total successful and failed `put` calls.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Total `get` calls.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn is_broken(&self, key: &str) -> bool {
        self.broken.read().expect("lock poisoned").contains(key)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> StoreResult<StoredObject> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.is_broken(key) {
            return Err(StoreError::Backend(format!("simulated failure reading {key}")));
        }
        if self.denied.read().expect("lock poisoned").contains(key) {
            return Err(StoreError::AccessDenied(key.to_string()));
        }
        let map = self.objects.read().expect("lock poisoned");
        let entry = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(StoredObject {
            body: entry.body.clone(),
            content_type: entry.content_type.clone(),
            last_modified: Some(entry.last_modified),
        })
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str, acl: &Acl) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StoreError::Backend(format!("simulated failure writing {key}")));
        }
        debug!(key, len = body.len(), content_type, acl = %acl, "memory put");
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(
            key.to_string(),
            Entry {
                body,
                content_type: content_type.to_string(),
                acl: acl.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.is_broken(key) || self.undeletable.read().expect("lock poisoned").contains(key) {
            return Err(StoreError::Backend(format!("simulated failure deleting {key}")));
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}
