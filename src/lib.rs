//! gatekeep - credential verification and session issuance.
//!
//! Accounts are stored with Argon2id digests behind a pluggable key-value
//! backend; sessions are random bearer tokens with a fixed lifetime.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use auth::{
    AuthError, AuthService, AuthSession, LimitResult, LoginAttempt, LoginLimiter, LoginState,
    PasswordError, PasswordHasher, SessionCleanup, SessionError, SessionManager, ValidationError,
};
pub use config::Config;
pub use db::{
    Account, CredentialStore, Database, KvBackend, MemoryBackend, NewAccount, StorageError,
    StoreError,
};
#[cfg(feature = "sqlite")]
pub use db::SqliteBackend;
pub use error::{GatekeepError, Result};
