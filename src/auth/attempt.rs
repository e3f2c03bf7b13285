//! State machine for a single login attempt.

use std::fmt;

use tracing::debug;

/// Stage of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Nothing checked yet.
    Start,
    /// Username found and password verified.
    CredentialsChecked,
    /// A session was issued. Terminal.
    SessionIssued,
    /// The attempt failed. Terminal.
    Rejected,
}

impl LoginState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginState::SessionIssued | LoginState::Rejected)
    }

    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(self, next: LoginState) -> bool {
        matches!(
            (self, next),
            (LoginState::Start, LoginState::CredentialsChecked)
                | (LoginState::Start, LoginState::Rejected)
                | (LoginState::CredentialsChecked, LoginState::SessionIssued)
                | (LoginState::CredentialsChecked, LoginState::Rejected)
        )
    }

    /// Lowercase name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            LoginState::Start => "start",
            LoginState::CredentialsChecked => "credentials_checked",
            LoginState::SessionIssued => "session_issued",
            LoginState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one login attempt through its states.
#[derive(Debug)]
pub struct LoginAttempt<'a> {
    username: &'a str,
    state: LoginState,
}

impl<'a> LoginAttempt<'a> {
    /// Begin an attempt for `username`.
    pub fn new(username: &'a str) -> Self {
        Self {
            username,
            state: LoginState::Start,
        }
    }

    /// Current state.
    pub fn state(&self) -> LoginState {
        self.state
    }

    fn advance(&mut self, next: LoginState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(
                username = %self.username,
                from = %self.state,
                to = %next,
                "Ignored illegal login state transition"
            );
            return false;
        }
        debug!(username = %self.username, from = %self.state, to = %next, "Login state");
        self.state = next;
        true
    }

    /// Record a successful credential check.
    pub fn credentials_checked(&mut self) -> bool {
        self.advance(LoginState::CredentialsChecked)
    }

    /// Record that a session was issued.
    pub fn session_issued(&mut self) -> bool {
        self.advance(LoginState::SessionIssued)
    }

    /// Record a failure.
    pub fn reject(&mut self) -> bool {
        self.advance(LoginState::Rejected)
    }
}
