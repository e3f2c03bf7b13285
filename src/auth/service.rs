//! Authentication service for gatekeep.
//!
//! Orchestrates registration, login and logout over the credential store,
//! the password hasher and the session manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::attempt::LoginAttempt;
use crate::auth::limiter::{LimitResult, LoginLimiter};
use crate::auth::password::{PasswordError, PasswordHasher};
use crate::auth::session::{AuthSession, SessionError, SessionManager};
use crate::auth::validation::{
    require_credentials, validate_password, validate_registration, ValidationError,
};
use crate::config::{Config, ValidationConfig};
use crate::db::{Account, CredentialStore, Database, NewAccount, StorageError, StoreError};

/// Errors reported by the authentication service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Caller supplied empty or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Username already registered.
    #[error("username already exists")]
    DuplicateUsername,

    /// Unknown username or wrong password. Deliberately does not say which.
    #[error("invalid username or password")]
    AuthenticationFailed,

    /// Token unknown, revoked or expired.
    #[error("invalid or expired session")]
    InvalidOrExpiredSession,

    /// Configured session lifetime cannot be represented.
    #[error("session ttl of {0:?} is out of range")]
    SessionTtlOutOfRange(Duration),

    /// Too many failed logins for this username.
    #[error("too many failed attempts, retry in {0} seconds")]
    TooManyAttempts(u64),

    /// Hasher failure.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidOrExpired => AuthError::InvalidOrExpiredSession,
            SessionError::TtlOutOfRange(ttl) => AuthError::SessionTtlOutOfRange(ttl),
            SessionError::Storage(e) => AuthError::Storage(e),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::NotFound => AuthError::AuthenticationFailed,
            StoreError::Storage(e) => AuthError::Storage(e),
        }
    }
}

/// Credential verification and session issuance.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct AuthService {
    accounts: CredentialStore,
    sessions: SessionManager,
    hasher: PasswordHasher,
    limiter: LoginLimiter,
    limits: ValidationConfig,
    /// Salt and digest hashed against for unknown usernames.
    decoy: (Vec<u8>, Vec<u8>),
    /// Bounds how many Argon2 computations run at once.
    hash_permits: Arc<Semaphore>,
}

impl AuthService {
    /// Assemble a service from its parts.
    pub fn new(
        db: Database,
        hasher: PasswordHasher,
        sessions_ttl: Duration,
        limiter: LoginLimiter,
        limits: ValidationConfig,
    ) -> Result<Self, AuthError> {
        let sessions = SessionManager::with_ttl(db.clone(), sessions_ttl);
        sessions.expiry_after(Utc::now())?;

        let decoy_salt = hasher.generate_salt();
        let decoy_digest = hasher.hash("gatekeep-decoy", &decoy_salt)?;
        let hash_permits = Arc::new(Semaphore::new(hasher.max_concurrent().max(1)));
        Ok(Self {
            accounts: CredentialStore::new(db),
            sessions,
            hasher,
            limiter,
            limits,
            decoy: (decoy_salt, decoy_digest),
            hash_permits,
        })
    }

    /// Build a service over `db` using the hashing, session, login and
    /// validation sections of `config`.
    pub fn from_config(db: Database, config: &Config) -> Result<Self, AuthError> {
        Self::new(
            db,
            PasswordHasher::new(&config.hashing)?,
            config.session.ttl(),
            LoginLimiter::new(&config.login),
            config.validation.clone(),
        )
    }

    /// The underlying session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The underlying credential store.
    pub fn accounts(&self) -> &CredentialStore {
        &self.accounts
    }

    /// The failed-login limiter.
    pub fn limiter(&self) -> &LoginLimiter {
        &self.limiter
    }

    /// Hashing permits not currently in use.
    pub fn idle_hash_permits(&self) -> usize {
        self.hash_permits.available_permits()
    }

    async fn hash_blocking(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>, AuthError> {
        let permit = Arc::clone(&self.hash_permits)
            .acquire_owned()
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let salt = salt.to_vec();
        task::spawn_blocking(move || {
            let _permit = permit;
            hasher.hash(&password, &salt)
        })
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))?
        .map_err(AuthError::from)
    }

    async fn verify_blocking(&self, password: &str, salt: &[u8], digest: &[u8]) -> bool {
        let Ok(permit) = Arc::clone(&self.hash_permits).acquire_owned().await else {
            return false;
        };
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let salt = salt.to_vec();
        let digest = digest.to_vec();
        task::spawn_blocking(move || {
            let _permit = permit;
            hasher.verify(&password, &salt, &digest)
        })
        .await
        .unwrap_or(false)
    }

    /// Check a password against `account`, or against the decoy when there
    /// is no account, so both cases cost one hash.
    async fn verify_account(&self, account: Option<&Account>, password: &str) -> bool {
        match account {
            Some(account) => {
                self.verify_blocking(password, &account.salt, &account.password_hash)
                    .await
            }
            None => {
                let (salt, digest) = &self.decoy;
                let _ = self.verify_blocking(password, salt, digest).await;
                false
            }
        }
    }

    /// Look up `username`, treating a missing account as `None`.
    async fn lookup(&self, username: &str) -> Result<Option<Account>, AuthError> {
        match self.accounts.find(username).await {
            Ok(account) => Ok(Some(account)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reserve a limiter slot for a credential check on `username`.
    fn reserve_attempt(&self, username: &str) -> Result<(), AuthError> {
        match self.limiter.reserve(username) {
            LimitResult::Allowed => Ok(()),
            LimitResult::Locked(remaining) => {
                warn!(
                    username = %username,
                    remaining_secs = remaining.as_secs(),
                    "Credential check blocked: too many failures"
                );
                Err(AuthError::TooManyAttempts(remaining.as_secs().max(1)))
            }
        }
    }

    fn password_too_long(&self, password: &str) -> bool {
        password.chars().count() > self.limits.max_password_length
    }

    /// Register a new account.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        validate_registration(username, email, password, &self.limits)?;

        // Skip the expensive hash when the name is visibly taken; the
        // atomic insert below still decides races.
        if self.accounts.exists(username).await? {
            return Err(AuthError::DuplicateUsername);
        }

        let salt = self.hasher.generate_salt();
        let password_hash = self.hash_blocking(password, &salt).await?;

        let account = self
            .accounts
            .create(NewAccount::new(username, password_hash, salt).with_email(email))
            .await?;

        info!(
            username = %account.username,
            user_id = %account.id,
            "New account registered"
        );
        Ok(account)
    }

    /// Verify credentials and issue a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let mut attempt = LoginAttempt::new(username);

        if let Err(e) = require_credentials(username, password) {
            attempt.reject();
            return Err(e.into());
        }

        if let Err(e) = self.reserve_attempt(username) {
            attempt.reject();
            return Err(e);
        }

        // No stored password can be this long; skip the hash.
        if self.password_too_long(password) {
            attempt.reject();
            warn!(username = %username, "Login failed: oversized password");
            return Err(AuthError::AuthenticationFailed);
        }

        let account = match self.lookup(username).await {
            Ok(account) => account,
            Err(e) => {
                attempt.reject();
                return Err(e);
            }
        };

        let verified = self.verify_account(account.as_ref(), password).await;
        let account = match account {
            Some(account) if verified => account,
            _ => {
                attempt.reject();
                warn!(username = %username, "Login failed");
                return Err(AuthError::AuthenticationFailed);
            }
        };
        attempt.credentials_checked();
        self.limiter.clear(username);

        let session = match self.sessions.issue(account.id).await {
            Ok(session) => session,
            Err(e) => {
                attempt.reject();
                return Err(e.into());
            }
        };
        attempt.session_issued();

        info!(
            username = %account.username,
            user_id = %account.id,
            "Login successful"
        );
        Ok(session)
    }

    /// Revoke a session. Succeeds whether or not the token was live.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if self.sessions.revoke(token).await? {
            info!("User logged out");
        }
        Ok(())
    }

    /// Resolve a token to its user ID.
    pub async fn validate_session(&self, token: &str) -> Result<Uuid, AuthError> {
        Ok(self.sessions.validate(token).await?)
    }

    /// Revoke every session of a user. Returns how many were live.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<usize, AuthError> {
        Ok(self.sessions.revoke_all(user_id).await?)
    }

    /// Change a password after verifying the current one.
    ///
    /// Wrong current passwords count against the same limiter as `login`.
    /// All sessions of the account are revoked on success.
    pub async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<Account, AuthError> {
        require_credentials(username, current_password)?;
        self.reserve_attempt(username)?;

        if self.password_too_long(current_password) {
            warn!(username = %username, "Password change rejected: oversized password");
            return Err(AuthError::AuthenticationFailed);
        }

        let account = self.lookup(username).await?;
        let verified = self.verify_account(account.as_ref(), current_password).await;
        let account = match account {
            Some(account) if verified => account,
            _ => {
                warn!(username = %username, "Password change rejected: wrong current password");
                return Err(AuthError::AuthenticationFailed);
            }
        };
        self.limiter.clear(username);

        validate_password(new_password, Some(&account.username), &self.limits)?;

        let salt = self.hasher.generate_salt();
        let password_hash = self.hash_blocking(new_password, &salt).await?;
        let account = self
            .accounts
            .update_password(username, password_hash, salt)
            .await?;

        let revoked = self.sessions.revoke_all(account.id).await?;
        info!(
            username = %account.username,
            user_id = %account.id,
            revoked_sessions = revoked,
            "Password changed"
        );
        Ok(account)
    }
}
