//! Test helpers for integration tests.
//!
//! Provides cheap-to-build services over memory or SQLite storage.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gatekeep::config::{HashingConfig, LoginConfig, StorageConfig, BackendKind};
use gatekeep::{AuthService, Config, Database};

/// Argon2 parameters small enough to keep tests fast.
pub fn fast_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
        ..HashingConfig::default()
    }
}

/// Default configuration with fast hashing and the limiter disabled.
pub fn test_config() -> Config {
    Config {
        hashing: fast_hashing(),
        login: LoginConfig {
            max_attempts: 0,
            ..LoginConfig::default()
        },
        ..Config::default()
    }
}

/// Service over a fresh in-memory backend.
pub fn memory_service(config: &Config) -> Arc<AuthService> {
    Arc::new(AuthService::from_config(Database::in_memory(), config).unwrap())
}

/// Service over a SQLite file inside `dir`.
pub async fn sqlite_service(dir: &tempfile::TempDir, config: &Config) -> Arc<AuthService> {
    let db = open_sqlite(dir).await;
    Arc::new(AuthService::from_config(db, config).unwrap())
}

/// Open (or reopen) the SQLite database inside `dir`.
pub async fn open_sqlite(dir: &tempfile::TempDir) -> Database {
    let storage = StorageConfig {
        backend: BackendKind::Sqlite,
        path: dir.path().join("gatekeep.db").to_string_lossy().into_owned(),
        op_timeout_ms: Duration::from_secs(10).as_millis() as u64,
        ..StorageConfig::default()
    };
    Database::open(&storage).await.unwrap()
}
