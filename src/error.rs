//! Error types for gatekeep.

use thiserror::Error;

use crate::auth::AuthError;
use crate::db::StorageError;

/// Common error type for gatekeep.
#[derive(Error, Debug)]
pub enum GatekeepError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Authentication flow error.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for gatekeep operations.
pub type Result<T> = std::result::Result<T, GatekeepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = GatekeepError::Config("ttl_secs must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: ttl_secs must be positive"
        );
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: GatekeepError = StorageError::Backend("disk full".to_string()).into();
        assert!(matches!(err, GatekeepError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: backend failure: disk full");
    }

    #[test]
    fn test_auth_error_is_transparent() {
        let err: GatekeepError = AuthError::AuthenticationFailed.into();
        assert_eq!(err.to_string(), "invalid username or password");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GatekeepError = io_err.into();
        assert!(matches!(err, GatekeepError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
