//! Session management for gatekeep.
//!
//! Tokens are 32 random bytes from the OS CSPRNG, base64url-encoded. Only
//! the SHA-256 digest of a token is used as the storage key, so the stored
//! records are useless to anyone who reads the backend directly.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{Database, StorageError};

/// Default session duration (24 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Fresh tokens tried before giving up on a digest collision.
const MAX_ISSUE_ATTEMPTS: usize = 3;

const SESSION_PREFIX: &str = "session:";

/// Session-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The token is unknown, revoked or past its expiry.
    #[error("invalid or expired session")]
    InvalidOrExpired,

    /// The TTL pushes `expires_at` past what a timestamp can hold.
    #[error("session ttl of {0:?} is out of range")]
    TtlOutOfRange(Duration),

    /// Storage backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An issued session, returned to the caller once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Bearer token (base64url, unpadded).
    pub token: String,
    /// Account the session belongs to.
    pub user_id: Uuid,
    /// When the session was issued.
    pub issued_at: DateTime<Utc>,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Get the remaining time until expiration.
    pub fn remaining_time(&self) -> Option<chrono::Duration> {
        let remaining = self.expires_at - Utc::now();
        if remaining > chrono::Duration::zero() {
            Some(remaining)
        } else {
            None
        }
    }
}

/// Stored form of a session; the token itself is not kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn session_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{SESSION_PREFIX}{}", URL_SAFE_NO_PAD.encode(digest))
}

/// Issues, validates and revokes sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    /// Create a session manager with the default TTL.
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }

    /// Create a session manager with a custom TTL.
    pub fn with_ttl(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// The configured session TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expiry of a session issued at `issued_at`.
    pub(crate) fn expiry_after(
        &self,
        issued_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SessionError> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or(SessionError::TtlOutOfRange(self.ttl))
    }

    /// Issue a new session for `user_id`.
    pub async fn issue(&self, user_id: Uuid) -> Result<AuthSession, SessionError> {
        let issued_at = Utc::now();
        let expires_at = self.expiry_after(issued_at)?;
        let record = SessionRecord {
            user_id,
            issued_at,
            expires_at,
        };

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let token = generate_token();
            if self
                .db
                .put_json_if_absent(&session_key(&token), &record)
                .await?
            {
                info!(user_id = %user_id, expires_at = %expires_at, "Session issued");
                return Ok(AuthSession {
                    token,
                    user_id,
                    issued_at,
                    expires_at,
                });
            }
            debug!("Session key collision, retrying with a fresh token");
        }

        Err(StorageError::Backend("could not allocate a unique session token".to_string()).into())
    }

    /// Validate a token and return the user it belongs to.
    ///
    /// An expired session is deleted on the spot.
    pub async fn validate(&self, token: &str) -> Result<Uuid, SessionError> {
        if token.is_empty() {
            return Err(SessionError::InvalidOrExpired);
        }

        let key = session_key(token);
        let record = self
            .db
            .get_json::<SessionRecord>(&key)
            .await?
            .ok_or(SessionError::InvalidOrExpired)?;

        if record.is_expired_at(Utc::now()) {
            self.db.delete(&key).await?;
            debug!(user_id = %record.user_id, "Expired session purged on access");
            return Err(SessionError::InvalidOrExpired);
        }

        Ok(record.user_id)
    }

    /// Revoke a session. Returns whether a session was removed.
    ///
    /// Unknown and already-revoked tokens are not an error.
    pub async fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        if token.is_empty() {
            return Ok(false);
        }

        let removed = self.db.delete(&session_key(token)).await?;
        if removed {
            info!("Session revoked");
        } else {
            debug!("Revoke: session not found");
        }
        Ok(removed)
    }

    async fn records(&self) -> Result<Vec<(String, SessionRecord)>, SessionError> {
        let entries = self.db.scan_prefix(SESSION_PREFIX).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            let record: SessionRecord =
                serde_json::from_slice(&bytes).map_err(StorageError::from)?;
            records.push((key, record));
        }
        Ok(records)
    }

    /// Revoke every session belonging to `user_id`.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<usize, SessionError> {
        let mut count = 0;
        for (key, record) in self.records().await? {
            if record.user_id == user_id && self.db.delete(&key).await? {
                count += 1;
            }
        }

        if count > 0 {
            info!(user_id = %user_id, count = count, "All user sessions revoked");
        }
        Ok(count)
    }

    /// Delete every expired session.
    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let mut removed = 0;
        for (key, record) in self.records().await? {
            if record.is_expired_at(now) && self.db.delete(&key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }

    /// Number of live sessions, optionally restricted to one user.
    pub async fn active_count(&self, user_id: Option<Uuid>) -> Result<usize, SessionError> {
        let now = Utc::now();
        Ok(self
            .records()
            .await?
            .iter()
            .filter(|(_, r)| !r.is_expired_at(now))
            .filter(|(_, r)| user_id.map_or(true, |id| r.user_id == id))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::sleep;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_token_uniqueness() {
        let tokens: HashSet<_> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_session_key_hides_token() {
        let token = generate_token();
        let key = session_key(&token);

        assert!(key.starts_with(SESSION_PREFIX));
        assert!(!key.contains(&token));
        assert_eq!(key, session_key(&token));
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let manager = SessionManager::new(Database::in_memory());
        let user_id = Uuid::new_v4();

        let session = manager.issue(user_id).await.unwrap();

        assert_eq!(session.user_id, user_id);
        assert!(!session.is_expired());
        assert!(session.expires_at > session.issued_at);
        assert_eq!(manager.validate(&session.token).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_ttl_applied() {
        let manager = SessionManager::with_ttl(Database::in_memory(), Duration::from_secs(3600));
        let session = manager.issue(Uuid::new_v4()).await.unwrap();

        assert_eq!(
            session.expires_at - session.issued_at,
            chrono::Duration::seconds(3600)
        );
        let remaining = session.remaining_time().unwrap();
        assert!(remaining.num_seconds() > 3500);
    }

    #[tokio::test]
    async fn test_issue_rejects_unrepresentable_ttl() {
        let db = Database::in_memory();

        for ttl in [
            Duration::from_secs(10_000_000_000_000),
            Duration::from_secs(u64::MAX),
        ] {
            let manager = SessionManager::with_ttl(db.clone(), ttl);
            assert_eq!(
                manager.issue(Uuid::new_v4()).await,
                Err(SessionError::TtlOutOfRange(ttl))
            );
        }
        assert_eq!(
            SessionManager::new(db).active_count(None).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let manager = SessionManager::new(Database::in_memory());

        assert_eq!(
            manager.validate("no-such-token").await,
            Err(SessionError::InvalidOrExpired)
        );
        assert_eq!(manager.validate("").await, Err(SessionError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn test_expired_session_is_invalid_and_purged() {
        let db = Database::in_memory();
        let manager = SessionManager::with_ttl(db.clone(), Duration::from_millis(50));
        let session = manager.issue(Uuid::new_v4()).await.unwrap();

        sleep(Duration::from_millis(100)).await;

        assert!(session.is_expired());
        assert!(session.remaining_time().is_none());
        assert_eq!(
            manager.validate(&session.token).await,
            Err(SessionError::InvalidOrExpired)
        );
        assert_eq!(db.get(&session_key(&session.token)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let manager = SessionManager::new(Database::in_memory());
        let session = manager.issue(Uuid::new_v4()).await.unwrap();

        assert!(manager.revoke(&session.token).await.unwrap());
        assert!(!manager.revoke(&session.token).await.unwrap());
        assert!(!manager.revoke("never-issued").await.unwrap());
        assert!(!manager.revoke("").await.unwrap());

        assert_eq!(
            manager.validate(&session.token).await,
            Err(SessionError::InvalidOrExpired)
        );
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let manager = SessionManager::new(Database::in_memory());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let a1 = manager.issue(alice).await.unwrap();
        let a2 = manager.issue(alice).await.unwrap();
        let b1 = manager.issue(bob).await.unwrap();

        assert_eq!(manager.active_count(None).await.unwrap(), 3);
        assert_eq!(manager.revoke_all(alice).await.unwrap(), 2);

        assert!(manager.validate(&a1.token).await.is_err());
        assert!(manager.validate(&a2.token).await.is_err());
        assert_eq!(manager.validate(&b1.token).await.unwrap(), bob);
        assert_eq!(manager.active_count(Some(alice)).await.unwrap(), 0);
        assert_eq!(manager.active_count(Some(bob)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let db = Database::in_memory();
        let short = SessionManager::with_ttl(db.clone(), Duration::from_millis(50));
        let long = SessionManager::with_ttl(db.clone(), Duration::from_secs(3600));

        short.issue(Uuid::new_v4()).await.unwrap();
        short.issue(Uuid::new_v4()).await.unwrap();
        let kept = long.issue(Uuid::new_v4()).await.unwrap();

        sleep(Duration::from_millis(100)).await;

        assert_eq!(long.active_count(None).await.unwrap(), 1);
        assert_eq!(long.purge_expired().await.unwrap(), 2);
        assert_eq!(long.purge_expired().await.unwrap(), 0);
        assert!(long.validate(&kept.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_error_display() {
        assert_eq!(
            SessionError::InvalidOrExpired.to_string(),
            "invalid or expired session"
        );
    }
}
