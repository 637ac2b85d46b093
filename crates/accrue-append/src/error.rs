use accrue_store::StoreError;

/// Errors produced by appender operations.
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    /// The store failed for a reason other than a missing object.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Stored contents of a JSON appender could not be parsed.
    #[error("invalid JSON contents: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored contents of a JSON appender parsed, but not as an array.
    #[error("stored object {key} is not a JSON array")]
    NotAnArray { key: String },

    /// A mutation was attempted without a loaded snapshot.
    #[error("no snapshot loaded for {key}")]
    NotLoaded { key: String },

    /// The task running the append was cancelled or panicked.
    #[error("append task aborted: {0}")]
    Aborted(String),
}

/// Result alias for appender operations.
pub type AppendResult<T> = Result<T, AppendError>;
