//! Account model for gatekeep.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
///
/// The password digest and salt are opaque bytes produced by the hasher;
/// the plaintext password is never part of this record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account ID, referenced by sessions.
    pub id: Uuid,
    /// Login username as originally registered (unique, case-insensitive).
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Argon2id digest of the password.
    pub password_hash: Vec<u8>,
    /// Per-account random salt.
    pub salt: Vec<u8>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last credential change.
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Data for creating a new account.
#[derive(Clone)]
pub struct NewAccount {
    /// Login username.
    pub username: String,
    /// Password digest.
    pub password_hash: Vec<u8>,
    /// Salt used for the digest.
    pub salt: Vec<u8>,
    /// Email address (optional).
    pub email: Option<String>,
}

impl NewAccount {
    /// Create a new account record with the given credentials.
    pub fn new(username: impl Into<String>, password_hash: Vec<u8>, salt: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            password_hash,
            salt,
            email: None,
        }
    }

    /// Set the email address. An empty string leaves it unset.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.email = if email.is_empty() { None } else { Some(email) };
        self
    }

    /// Materialize the stored record, stamping ID and timestamps.
    pub(crate) fn into_account(self) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            salt: self.salt,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_builder() {
        let new = NewAccount::new("alice", vec![1; 32], vec![2; 16]).with_email("a@x.com");

        assert_eq!(new.username, "alice");
        assert_eq!(new.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_empty_email_is_unset() {
        let new = NewAccount::new("alice", vec![1; 32], vec![2; 16]).with_email("");
        assert!(new.email.is_none());
    }

    #[test]
    fn test_into_account_assigns_identity() {
        let a = NewAccount::new("alice", vec![1; 32], vec![2; 16]).into_account();
        let b = NewAccount::new("alice", vec![1; 32], vec![2; 16]).into_account();

        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let account = NewAccount::new("alice", vec![0xAB; 32], vec![0xCD; 16]).into_account();
        let rendered = format!("{account:?}");

        assert!(rendered.contains("alice"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("171, 171"));
        assert!(!rendered.contains("205, 205"));
    }

    #[test]
    fn test_account_json_roundtrip() {
        let account = NewAccount::new("alice", vec![7; 32], vec![9; 16]).into_account();
        let json = serde_json::to_vec(&account).unwrap();
        let back: Account = serde_json::from_slice(&json).unwrap();
        assert_eq!(account, back);
    }
}
