//! End-to-end authentication tests for gatekeep.
//!
//! Tests registration, login, logout and session expiry flows.

mod common;

use std::time::Duration;

use common::{memory_service, test_config};
use gatekeep::{AuthError, ValidationError};

/// Test successful registration then login.
#[tokio::test]
async fn test_register_then_login() {
    let auth = memory_service(&test_config());

    let account = auth.register("alice", "a@x.com", "secret").await.unwrap();
    let session = auth.login("alice", "secret").await.unwrap();

    assert_eq!(session.user_id, account.id);
    assert!(!session.token.is_empty());
    assert!(session.expires_at > session.issued_at);
    assert_eq!(
        auth.validate_session(&session.token).await.unwrap(),
        account.id
    );
}

/// Test login with wrong password.
#[tokio::test]
async fn test_login_wrong_password() {
    let auth = memory_service(&test_config());
    auth.register("alice", "a@x.com", "secret").await.unwrap();

    let result = auth.login("alice", "wrong").await;
    assert_eq!(result, Err(AuthError::AuthenticationFailed));
}

/// Unknown users and wrong passwords are indistinguishable to the caller.
#[tokio::test]
async fn test_failures_do_not_disclose_cause() {
    let auth = memory_service(&test_config());
    auth.register("alice", "a@x.com", "secret").await.unwrap();

    let wrong_password = auth.login("alice", "wrong").await.unwrap_err();
    let unknown_user = auth.login("mallory", "secret").await.unwrap_err();

    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

/// Empty fields are rejected before any lookup.
#[tokio::test]
async fn test_empty_fields_rejected() {
    let auth = memory_service(&test_config());

    for (username, password) in [("", "secret"), ("alice", ""), ("", "")] {
        assert!(
            matches!(
                auth.login(username, password).await,
                Err(AuthError::InvalidInput(_))
            ),
            "login({username:?}, {password:?}) should be invalid input"
        );
        assert!(
            matches!(
                auth.register(username, "a@x.com", password).await,
                Err(AuthError::InvalidInput(_))
            ),
            "register({username:?}, {password:?}) should be invalid input"
        );
    }
}

/// A taken username cannot be registered again.
#[tokio::test]
async fn test_duplicate_registration() {
    let auth = memory_service(&test_config());

    for name in ["alice", "bob", "carol_1"] {
        auth.register(name, "", "secret").await.unwrap();
        assert_eq!(
            auth.register(name, "", "secret").await,
            Err(AuthError::DuplicateUsername)
        );
    }
    assert_eq!(auth.accounts().count().await.unwrap(), 3);
}

/// Logout twice, and logout of an unknown token, both succeed.
#[tokio::test]
async fn test_logout_idempotent() {
    let auth = memory_service(&test_config());
    auth.register("alice", "a@x.com", "secret").await.unwrap();
    let session = auth.login("alice", "secret").await.unwrap();

    auth.logout(&session.token).await.unwrap();
    auth.logout(&session.token).await.unwrap();
    auth.logout("never-issued").await.unwrap();

    assert_eq!(
        auth.validate_session(&session.token).await,
        Err(AuthError::InvalidOrExpiredSession)
    );
}

/// Logging out one session leaves the others alive.
#[tokio::test]
async fn test_logout_is_per_session() {
    let auth = memory_service(&test_config());
    auth.register("alice", "a@x.com", "secret").await.unwrap();
    let laptop = auth.login("alice", "secret").await.unwrap();
    let phone = auth.login("alice", "secret").await.unwrap();

    auth.logout(&laptop.token).await.unwrap();

    assert!(auth.validate_session(&laptop.token).await.is_err());
    assert!(auth.validate_session(&phone.token).await.is_ok());
}

/// Sessions stop validating once their TTL has passed.
#[tokio::test]
async fn test_session_expiry() {
    let mut config = test_config();
    config.session.ttl_secs = 1;
    let auth = memory_service(&config);

    auth.register("alice", "a@x.com", "secret").await.unwrap();
    let session = auth.login("alice", "secret").await.unwrap();
    assert!(auth.validate_session(&session.token).await.is_ok());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        auth.validate_session(&session.token).await,
        Err(AuthError::InvalidOrExpiredSession)
    );
}

/// The limiter locks an account out after repeated failures.
#[tokio::test]
async fn test_lockout() {
    let mut config = test_config();
    config.login.max_attempts = 3;
    let auth = memory_service(&config);
    auth.register("alice", "a@x.com", "secret").await.unwrap();

    for _ in 0..3 {
        assert_eq!(
            auth.login("alice", "wrong").await,
            Err(AuthError::AuthenticationFailed)
        );
    }

    match auth.login("alice", "secret").await {
        Err(AuthError::TooManyAttempts(secs)) => assert!(secs > 0),
        other => panic!("expected lockout, got {other:?}"),
    }
}

/// Registration rejects malformed input with the specific reason.
#[tokio::test]
async fn test_register_reports_reason() {
    let auth = memory_service(&test_config());

    assert_eq!(
        auth.register("ab", "", "secret").await,
        Err(AuthError::InvalidInput(ValidationError::UsernameTooShort(3)))
    );
    assert_eq!(
        auth.register("alice", "", "12345").await,
        Err(AuthError::InvalidInput(ValidationError::PasswordTooShort(6)))
    );
    assert_eq!(
        auth.register("secret", "", "secret").await,
        Err(AuthError::InvalidInput(ValidationError::PasswordSameAsUsername))
    );
}

/// Password changes share the login lockout.
#[tokio::test]
async fn test_change_password_locked_with_login() {
    let mut config = test_config();
    config.login.max_attempts = 2;
    let auth = memory_service(&config);
    auth.register("alice", "a@x.com", "secret").await.unwrap();

    let _ = auth.login("alice", "guess1").await;
    let _ = auth.login("alice", "guess2").await;

    for current in ["guess3", "secret"] {
        assert!(matches!(
            auth.change_password("alice", current, "abc").await,
            Err(AuthError::TooManyAttempts(_))
        ));
    }
}
