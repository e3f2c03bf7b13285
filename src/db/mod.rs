//! Storage module for gatekeep.
//!
//! This module provides the key-value backend abstraction, its in-memory and
//! SQLite implementations, and the credential store built on top of them.

mod account;
mod memory;
mod repository;
#[cfg(feature = "sqlite")]
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use account::{Account, NewAccount};
pub use memory::MemoryBackend;
pub use repository::{CredentialStore, StoreError};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, IN_MEMORY_PATH};
pub use traits::{KvBackend, StorageError, StorageResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{BackendKind, StorageConfig};

/// Default per-operation timeout.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to a storage backend.
///
/// Every call is bounded by `op_timeout`; a backend that does not answer in
/// time yields `StorageError::Timeout` instead of stalling the caller.
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn KvBackend>,
    op_timeout: Duration,
}

impl Database {
    /// Wrap an existing backend.
    pub fn new(backend: Arc<dyn KvBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
        }
    }

    /// Open the backend selected by the configuration.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        let op_timeout = config.op_timeout();
        let backend: Arc<dyn KvBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Arc::new(
                SqliteBackend::open(&config.path, config.max_connections, op_timeout).await?,
            ),
            #[cfg(not(feature = "sqlite"))]
            BackendKind::Sqlite => {
                return Err(StorageError::Backend(
                    "sqlite support was not compiled in".to_string(),
                ))
            }
        };
        info!(backend = backend.backend_name(), "Storage opened");
        Ok(Self::new(backend, op_timeout))
    }

    /// An empty in-memory database for testing.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), DEFAULT_OP_TIMEOUT)
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// The per-operation timeout.
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    op = op,
                    backend = self.backend.backend_name(),
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Storage operation timed out"
                );
                Err(StorageError::Timeout(self.op_timeout))
            }
        }
    }

    /// Get the raw value stored under `key`.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.bounded("get", self.backend.get(key)).await
    }

    /// Store a raw value under `key`.
    pub async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.bounded("put", self.backend.put(key, value)).await
    }

    /// Store a raw value only if `key` is absent.
    pub async fn put_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        self.bounded("put_if_absent", self.backend.put_if_absent(key, value))
            .await
    }

    /// Delete `key`.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.bounded("delete", self.backend.delete(key)).await
    }

    /// List raw entries under `prefix`.
    pub async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.bounded("scan_prefix", self.backend.scan_prefix(prefix))
            .await
    }

    /// Get a typed value by deserializing from JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes).await
    }

    /// Set a typed value only if `key` is absent.
    pub async fn put_json_if_absent<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<bool> {
        let bytes = serde_json::to_vec(value)?;
        self.put_if_absent(key, &bytes).await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend.backend_name())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}
