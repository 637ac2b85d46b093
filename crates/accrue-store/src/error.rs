/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store refused access to the object.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The key cannot be used with this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// `true` for the errors callers treat as "object does not exist".
    ///
    /// Access-denied is included: stores commonly answer a missing key with
    /// access-denied when the caller lacks list permission.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AccessDenied(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_kinds() {
        assert!(StoreError::NotFound("k".into()).is_absent());
        assert!(StoreError::AccessDenied("k".into()).is_absent());
        assert!(!StoreError::Backend("boom".into()).is_absent());
        assert!(!StoreError::Io(std::io::Error::other("disk")).is_absent());
    }
}
