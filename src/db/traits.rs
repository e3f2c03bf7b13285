//! Storage abstraction traits for gatekeep.
//!
//! Account and session records are persisted through a minimal key-value
//! interface so that the credential store and session manager never depend
//! on a concrete engine. Keys are UTF-8 strings, values are opaque bytes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage-layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend reported a failure.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The operation did not complete within the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value could not be encoded or decoded.
    #[error("serialization failure: {0}")]
    Serialization(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key-value backend used by the credential store and session manager.
///
/// Implementations must make `put_if_absent` atomic with respect to every
/// other operation on the same key: of several concurrent calls for one
/// absent key, exactly one returns `true`.
#[async_trait]
pub trait KvBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the name of the backend.
    fn backend_name(&self) -> &'static str;

    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool>;

    /// Delete `key`. Returns whether a value was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// List every entry whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::Backend("locked".to_string()).to_string(),
            "backend failure: locked"
        );
        assert_eq!(
            StorageError::Timeout(Duration::from_millis(250)).to_string(),
            "operation timed out after 250ms"
        );
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err = serde_json::from_slice::<u32>(b"not json").unwrap_err();
        let err: StorageError = err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
