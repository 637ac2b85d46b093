use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use accrue_types::Acl;

use crate::error::StoreResult;

/// A whole object as returned by [`ObjectStore::get`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw object body.
    pub body: Bytes,
    /// Content-type recorded at write time; empty if unknown.
    pub content_type: String,
    /// Last modification time reported by the store.
    pub last_modified: Option<DateTime<Utc>>,
}

impl StoredObject {
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
            last_modified: None,
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Whole-object store keyed by path.
///
/// All implementations must satisfy these invariants:
/// - `get` on a missing key returns `StoreError::NotFound` (or
///   `StoreError::AccessDenied` when the store hides existence).
/// - `put` replaces the whole object.
/// - `delete` succeeds whether or not the key exists.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object.
    async fn get(&self, key: &str) -> StoreResult<StoredObject>;

    /// Replace a whole object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str, acl: &Acl) -> StoreResult<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
