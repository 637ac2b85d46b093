use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use accrue_merge::{DefaultSorter, Sorter};
use accrue_store::{normalize_key, ObjectStore, StoreError};
use accrue_types::{Acl, FileContents, Format, MergeResult};

use crate::error::{ConsolidateError, ConsolidateResult};

/// Outcome of a [`Consolidator::consolidate`] call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsolidateReport {
    /// Normalized key the merged object was written to.
    pub destination: String,
    /// Format chosen by the sorter.
    pub format: Format,
    /// Source keys that were downloaded and merged.
    pub merged: Vec<String>,
    /// Source keys that did not exist (or were not readable) at download time.
    pub missing: Vec<String>,
    /// Source keys deleted after the write.
    pub deleted: Vec<String>,
}

/// Merges many objects into one.
#[derive(Clone)]
pub struct Consolidator {
    store: Arc<dyn ObjectStore>,
}

impl Consolidator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Download `keys` and merge them with the default sorter.
    pub async fn concatenate<S>(&self, keys: &[S]) -> ConsolidateResult<MergeResult>
    where
        S: AsRef<str> + Sync,
    {
        self.concatenate_with(keys, &DefaultSorter).await
    }

    /// Download `keys` concurrently and merge the ones that exist with
    /// `sorter`.
    pub async fn concatenate_with<S>(
        &self,
        keys: &[S],
        sorter: &dyn Sorter,
    ) -> ConsolidateResult<MergeResult>
    where
        S: AsRef<str> + Sync,
    {
        let files: Vec<FileContents> = self.download_all(keys).await?.into_iter().flatten().collect();
        Ok(sorter.sort(&files))
    }

    /// Merge `keys` into `destination` with the default sorter and a private
    /// ACL, then delete every source other than `destination`.
    pub async fn consolidate<S>(
        &self,
        keys: &[S],
        destination: &str,
    ) -> ConsolidateResult<ConsolidateReport>
    where
        S: AsRef<str> + Sync,
    {
        self.consolidate_with(keys, destination, &DefaultSorter, &Acl::default())
            .await
    }

    /// Merge `keys` into `destination`, then delete every source other than
    /// `destination`.
    ///
    /// `destination` is normalized like the source keys, so a source that
    /// decodes to the destination is overwritten rather than deleted.
    /// Sources are only deleted after the merged object was written. Any
    /// failed download, write or delete fails the whole call.
    pub async fn consolidate_with<S>(
        &self,
        keys: &[S],
        destination: &str,
        sorter: &dyn Sorter,
        acl: &Acl,
    ) -> ConsolidateResult<ConsolidateReport>
    where
        S: AsRef<str> + Sync,
    {
        let downloads = self.download_all(keys).await?;

        let mut merged = Vec::new();
        let mut missing = Vec::new();
        let mut files = Vec::new();
        for (key, download) in keys.iter().zip(downloads) {
            match download {
                Some(file) => {
                    merged.push(key.as_ref().to_string());
                    files.push(file);
                }
                None => missing.push(key.as_ref().to_string()),
            }
        }

        let destination = normalize_key(destination);
        let result = sorter.sort(&files);
        self.store
            .put(
                &destination,
                Bytes::from(result.contents),
                result.format.content_type(),
                acl,
            )
            .await
            .map_err(|source| ConsolidateError::Write {
                key: destination.clone(),
                source,
            })?;
        debug!(%destination, format = %result.format, "consolidated object written");

        let to_delete: Vec<String> = keys
            .iter()
            .map(|k| k.as_ref())
            .filter(|k| normalize_key(k) != destination)
            .map(str::to_string)
            .collect();
        try_join_all(to_delete.iter().map(|key| self.delete(key))).await?;

        info!(
            %destination,
            format = %result.format,
            merged = merged.len(),
            missing = missing.len(),
            deleted = to_delete.len(),
            "consolidation complete"
        );
        Ok(ConsolidateReport {
            destination,
            format: result.format,
            merged,
            missing,
            deleted: to_delete,
        })
    }

    async fn download_all<S>(&self, keys: &[S]) -> ConsolidateResult<Vec<Option<FileContents>>>
    where
        S: AsRef<str> + Sync,
    {
        try_join_all(keys.iter().map(|key| self.download(key.as_ref()))).await
    }

    /// Fetch one source. Absent and access-denied objects yield `None`.
    async fn download(&self, key: &str) -> ConsolidateResult<Option<FileContents>> {
        match self.store.get(&normalize_key(key)).await {
            Ok(object) => {
                debug!(key, len = object.body.len(), "downloaded");
                Ok(Some(FileContents::new(
                    key,
                    object.last_modified,
                    object.content_type.clone(),
                    object.text(),
                )))
            }
            Err(StoreError::AccessDenied(_)) => {
                warn!(key, "access denied downloading source; treating as absent");
                Ok(None)
            }
            Err(e) if e.is_absent() => {
                debug!(key, "source absent");
                Ok(None)
            }
            Err(source) => Err(ConsolidateError::Download {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn delete(&self, key: &str) -> ConsolidateResult<()> {
        self.store
            .delete(&normalize_key(key))
            .await
            .map_err(|source| ConsolidateError::Delete {
                key: key.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator").finish_non_exhaustive()
    }
}
