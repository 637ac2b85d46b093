use thiserror::Error;

/// Errors from consolidation.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    /// Downloading a source object failed for a reason other than absence.
    #[error("failed to download {key}: {source}")]
    Download {
        key: String,
        #[source]
        source: accrue_store::StoreError,
    },

    /// Writing the consolidated object failed. No source was deleted.
    #[error("failed to write {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: accrue_store::StoreError,
    },

    /// Deleting a source object failed after the consolidated object was
    /// written.
    #[error("failed to delete {key}: {source}")]
    Delete {
        key: String,
        #[source]
        source: accrue_store::StoreError,
    },
}

pub type ConsolidateResult<T> = Result<T, ConsolidateError>;
