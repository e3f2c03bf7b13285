//! Credential store for gatekeep.
//!
//! Accounts live under `account:<lowercased username>`, so uniqueness is
//! case-insensitive and enforced by a single atomic insert.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::account::{Account, NewAccount};
use super::traits::StorageError;
use super::Database;

const ACCOUNT_PREFIX: &str = "account:";

/// Credential store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An account with this username already exists.
    #[error("username already exists")]
    DuplicateUsername,

    /// No account with this username.
    #[error("account not found")]
    NotFound,

    /// Storage backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn account_key(username: &str) -> String {
    format!("{ACCOUNT_PREFIX}{}", username.to_lowercase())
}

/// Persists account records keyed by username.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    /// Create a new store over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new account.
    ///
    /// The existence check and the insert are one backend operation, so of
    /// several concurrent creations for the same username exactly one wins.
    pub async fn create(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let key = account_key(&new_account.username);
        let account = new_account.into_account();

        if !self.db.put_json_if_absent(&key, &account).await? {
            debug!(username = %account.username, "Account creation lost to existing record");
            return Err(StoreError::DuplicateUsername);
        }

        info!(
            username = %account.username,
            user_id = %account.id,
            "Account created"
        );
        Ok(account)
    }

    /// Find an account by username (case-insensitive).
    pub async fn find(&self, username: &str) -> Result<Account, StoreError> {
        self.db
            .get_json::<Account>(&account_key(username))
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Check if a username is already taken (case-insensitive).
    pub async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.db.get(&account_key(username)).await?.is_some())
    }

    /// Replace the stored credentials of an existing account.
    pub async fn update_password(
        &self,
        username: &str,
        password_hash: Vec<u8>,
        salt: Vec<u8>,
    ) -> Result<Account, StoreError> {
        let key = account_key(username);
        let mut account = self
            .db
            .get_json::<Account>(&key)
            .await?
            .ok_or(StoreError::NotFound)?;

        account.password_hash = password_hash;
        account.salt = salt;
        account.updated_at = Utc::now();
        self.db.put_json(&key, &account).await?;

        info!(username = %account.username, user_id = %account.id, "Account credentials updated");
        Ok(account)
    }

    /// Count all accounts.
    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.db.scan_prefix(ACCOUNT_PREFIX).await?.len())
    }
}
