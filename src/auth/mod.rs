//! Authentication module for gatekeep.
//!
//! This module provides password hashing, session management, input
//! validation and the service that ties them together.

mod attempt;
mod cleanup;
mod limiter;
mod password;
mod service;
mod session;
pub mod validation;

pub use attempt::{LoginAttempt, LoginState};
pub use cleanup::{run_once as run_cleanup_once, SessionCleanup};
pub use limiter::{LimitResult, LoginLimiter};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthError, AuthService};
pub use session::{AuthSession, SessionError, SessionManager, DEFAULT_SESSION_TTL_SECS};
pub use validation::ValidationError;
