use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use accrue_types::{Acl, StoreConfig};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, StoredObject};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const TMP_DIR: &str = "tmp";

/// Per-object metadata kept next to the body.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    acl: Acl,
}

/// Object store backed by a local directory.
///
/// Layout under `<root>/<bucket>/`:
///
/// - `objects/<key>` -- object bodies
/// - `meta/<key>.json` -- content-type and access policy
/// - `tmp/` -- staging area; bodies are written here and renamed into place
///
/// Last-modified times come from filesystem metadata.
#[derive(Debug)]
pub struct LocalObjectStore {
    base: PathBuf,
}

impl LocalObjectStore {
    /// Open (creating if needed) the bucket directory described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let root = config
            .root
            .clone()
            .ok_or_else(|| StoreError::Backend("local store requires a root directory".into()))?;
        let base = root.join(&config.bucket);
        for dir in [OBJECTS_DIR, META_DIR, TMP_DIR] {
            std::fs::create_dir_all(base.join(dir))?;
        }
        debug!(base = %base.display(), "opened local object store");
        Ok(Self { base })
    }

    /// Directory holding this bucket.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base.join(OBJECTS_DIR).join(key))
    }

    fn meta_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base.join(META_DIR).join(format!("{key}.json")))
    }

    /// Stage `data` under a uniquely named file in `tmp/`, then rename it
    /// over `dest`.
    async fn write_atomic(&self, dest: &Path, data: &[u8]) -> StoreResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_dir = self.base.join(TMP_DIR);
        let dest = dest.to_path_buf();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut staged = NamedTempFile::new_in(&tmp_dir)?;
            staged.write_all(&data)?;
            staged.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))?
    }

    async fn read_meta(&self, key: &str) -> StoreResult<ObjectMeta> {
        match tokio::fs::read(self.meta_path(key)?).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectMeta::default()),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("key must be relative"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("key contains a forbidden character"));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(invalid("key contains an empty or relative segment"));
    }
    Ok(())
}

fn map_read_error(key: &str, e: std::io::Error) -> StoreError {
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
        ErrorKind::PermissionDenied => StoreError::AccessDenied(key.to_string()),
        _ => StoreError::Io(e),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, key: &str) -> StoreResult<StoredObject> {
        let path = self.object_path(key)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| map_read_error(key, e))?;
        let modified = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_read_error(key, e))?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        let meta = self.read_meta(key).await?;
        debug!(key, len = body.len(), "local get");
        Ok(StoredObject {
            body: Bytes::from(body),
            content_type: meta.content_type,
            last_modified: modified,
        })
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str, acl: &Acl) -> StoreResult<()> {
        let path = self.object_path(key)?;
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            acl: acl.clone(),
        };
        let meta_raw = serde_json::to_vec(&meta)?;
        self.write_atomic(&self.meta_path(key)?, &meta_raw).await?;
        self.write_atomic(&path, &body).await?;
        debug!(key, len = body.len(), content_type, "local put");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        for path in [self.object_path(key)?, self.meta_path(key)?] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(key, "local delete");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let root = self.base.join(OBJECTS_DIR);
        let mut keys = Vec::new();
        let mut pending = vec![(root, String::new())];
        while let Some((dir, rel)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if rel.is_empty() {
                    name
                } else {
                    format!("{rel}/{name}")
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &Path) -> LocalObjectStore {
        LocalObjectStore::open(&StoreConfig::new("bucket").with_root(dir)).unwrap()
    }

    #[tokio::test]
    async fn round_trip_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store
            .put(
                "logs/day one.json",
                Bytes::from_static(b"[1,2]"),
                "application/json",
                &Acl::PublicRead,
            )
            .await
            .unwrap();

        let obj = store.get("logs/day one.json").await.unwrap();
        assert_eq!(obj.text(), "[1,2]");
        assert_eq!(obj.content_type, "application/json");
        assert!(obj.last_modified.is_some());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let err = store.get("missing.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_body_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store
            .put("a.txt", Bytes::from_static(b"x"), "text/plain", &Acl::Private)
            .await
            .unwrap();
        store.delete("a.txt").await.unwrap();
        store.delete("a.txt").await.unwrap();
        assert!(store.get("a.txt").await.unwrap_err().is_absent());
        assert!(!store.base().join(META_DIR).join("a.txt.json").exists());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        for key in ["", "/etc/passwd", "../up", "a//b", "a/./b"] {
            let err = store.get(key).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{key:?}");
        }
    }

    #[tokio::test]
    async fn list_walks_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        for key in ["logs/2024/b.txt", "logs/a.txt", "misc.txt"] {
            store
                .put(key, Bytes::from_static(b""), "text/plain", &Acl::Private)
                .await
                .unwrap();
        }
        assert_eq!(
            store.list("logs/").await.unwrap(),
            vec!["logs/2024/b.txt", "logs/a.txt"]
        );
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn two_handles_on_one_bucket_do_not_clobber_writes() {
        let dir = tempfile::tempdir().unwrap();
        let first = open(dir.path());
        let second = open(dir.path());

        let writes = (0..16).map(|i| {
            let store = if i % 2 == 0 { &first } else { &second };
            let key = format!("k/{i}.txt");
            async move {
                store
                    .put(&key, Bytes::from(format!("body {i}")), "text/plain", &Acl::Private)
                    .await
            }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        for i in 0..16 {
            let object = first.get(&format!("k/{i}.txt")).await.unwrap();
            assert_eq!(object.text(), format!("body {i}"));
        }
        let staged = std::fs::read_dir(first.base().join(TMP_DIR)).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[test]
    fn open_requires_root() {
        let err = LocalObjectStore::open(&StoreConfig::new("bucket")).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
