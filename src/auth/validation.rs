//! Input validation for registration and login.
//!
//! Limits come from [`ValidationConfig`]; the helpers here are pure and
//! return the first problem found.

use thiserror::Error;

use crate::config::ValidationConfig;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is empty.
    #[error("username is required")]
    UsernameEmpty,

    /// Username is too short.
    #[error("username must be at least {0} characters")]
    UsernameTooShort(usize),

    /// Username is too long.
    #[error("username must be at most {0} characters")]
    UsernameTooLong(usize),

    /// Username contains invalid characters.
    #[error("username can only contain letters, digits, '_', '-' and '.'")]
    UsernameInvalidChars,

    /// Password is empty.
    #[error("password is required")]
    PasswordEmpty,

    /// Password is too short.
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    /// Password is too long.
    #[error("password must be at most {0} characters")]
    PasswordTooLong(usize),

    /// Password is the same as username.
    #[error("password cannot be the same as username")]
    PasswordSameAsUsername,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,
}

/// Check that both login fields are present.
pub fn require_credentials(username: &str, password: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::UsernameEmpty);
    }
    if password.is_empty() {
        return Err(ValidationError::PasswordEmpty);
    }
    Ok(())
}

/// Validate a username for registration.
///
/// Length is counted in characters; allowed characters are ASCII letters,
/// digits, `_`, `-` and `.`.
pub fn validate_username(username: &str, limits: &ValidationConfig) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::UsernameEmpty);
    }

    let len = username.chars().count();
    if len < limits.min_username_length {
        return Err(ValidationError::UsernameTooShort(limits.min_username_length));
    }
    if len > limits.max_username_length {
        return Err(ValidationError::UsernameTooLong(limits.max_username_length));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::UsernameInvalidChars);
    }

    Ok(())
}

/// Validate a new password.
///
/// When `username` is given, the password must not equal it (ignoring ASCII case).
pub fn validate_password(
    password: &str,
    username: Option<&str>,
    limits: &ValidationConfig,
) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordEmpty);
    }

    let len = password.chars().count();
    if len < limits.min_password_length {
        return Err(ValidationError::PasswordTooShort(limits.min_password_length));
    }
    if len > limits.max_password_length {
        return Err(ValidationError::PasswordTooLong(limits.max_password_length));
    }

    if let Some(user) = username {
        if password.eq_ignore_ascii_case(user) {
            return Err(ValidationError::PasswordSameAsUsername);
        }
    }

    Ok(())
}

/// Validate an email address (optional field).
///
/// Empty is accepted. Otherwise a basic `local@domain.tld` shape is required.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Ok(());
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }

    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }

    if domain.split('.').any(|part| part.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

/// Validate all registration fields at once.
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    limits: &ValidationConfig,
) -> Result<(), ValidationError> {
    validate_username(username, limits)?;
    validate_password(password, Some(username), limits)?;
    validate_email(email)?;
    Ok(())
}
