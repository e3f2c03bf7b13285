//! Failed-login limiter.
//!
//! Tracks failed login attempts per username and enforces a lockout after
//! too many failures inside a sliding window.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::LoginConfig;

/// Result of a login attempt rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitResult {
    /// Login attempt is allowed.
    Allowed,
    /// Account is locked for the specified duration.
    Locked(Duration),
}

/// Per-username failure tracker.
///
/// Keys are lowercased so `Alice` and `alice` share one history.
#[derive(Debug)]
pub struct LoginLimiter {
    attempts: DashMap<String, Vec<Instant>>,
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new(&LoginConfig::default())
    }
}

impl LoginLimiter {
    /// Create a limiter from configuration.
    pub fn new(config: &LoginConfig) -> Self {
        Self::with_config(config.max_attempts, config.window_secs, config.lockout_secs)
    }

    /// Create a limiter with explicit settings. `max_attempts == 0` disables it.
    pub fn with_config(max_attempts: u32, window_secs: u64, lockout_secs: u64) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
            window: Duration::from_secs(window_secs),
            lockout: Duration::from_secs(lockout_secs),
        }
    }

    fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Apply the lockout rule to one history. Clears it once a lockout is served.
    fn evaluate(&self, attempts: &mut Vec<Instant>, now: Instant) -> LimitResult {
        if attempts.len() >= self.max_attempts as usize {
            if let Some(last) = attempts.last() {
                let elapsed = now.duration_since(*last);
                if elapsed < self.lockout {
                    return LimitResult::Locked(self.lockout - elapsed);
                }
            }
            // Lockout served.
            attempts.clear();
            return LimitResult::Allowed;
        }

        attempts.retain(|t| now.duration_since(*t) < self.window);
        LimitResult::Allowed
    }

    /// Check if a login attempt is allowed for the given username.
    ///
    /// Does not count the attempt; pair with [`record_failure`](Self::record_failure),
    /// or use [`reserve`](Self::reserve) when attempts may run in parallel.
    pub fn check(&self, username: &str) -> LimitResult {
        if !self.is_enabled() {
            return LimitResult::Allowed;
        }

        let Some(mut attempts) = self.attempts.get_mut(&username.to_lowercase()) else {
            return LimitResult::Allowed;
        };
        self.evaluate(&mut attempts, Instant::now())
    }

    /// Check the limit and, if allowed, count this attempt as a failure.
    ///
    /// Check and count happen under one entry lock, so parallel attempts
    /// cannot overrun `max_attempts`. A successful login undoes the count
    /// with [`clear`](Self::clear).
    pub fn reserve(&self, username: &str) -> LimitResult {
        if !self.is_enabled() {
            return LimitResult::Allowed;
        }

        let now = Instant::now();
        let mut attempts = self.attempts.entry(username.to_lowercase()).or_default();
        let result = self.evaluate(&mut attempts, now);
        if result == LimitResult::Allowed {
            attempts.push(now);
            debug!(
                username = %username,
                attempt_count = attempts.len(),
                "Reserved login attempt"
            );
        }
        result
    }

    /// Record a failed login attempt.
    pub fn record_failure(&self, username: &str) {
        if !self.is_enabled() {
            return;
        }

        let now = Instant::now();
        let mut attempts = self.attempts.entry(username.to_lowercase()).or_default();
        attempts.retain(|t| now.duration_since(*t) < self.window);
        attempts.push(now);

        debug!(
            username = %username,
            attempt_count = attempts.len(),
            "Recorded failed login attempt"
        );
    }

    /// Clear all attempts for a username (call on successful login).
    pub fn clear(&self, username: &str) {
        self.attempts.remove(&username.to_lowercase());
    }

    /// Get the number of failed attempts inside the window for a username.
    pub fn attempt_count(&self, username: &str) -> usize {
        let now = Instant::now();
        self.attempts
            .get(&username.to_lowercase())
            .map(|a| {
                a.iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop histories with no attempt left inside the window or lockout.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let horizon = self.window.max(self.lockout);
        self.attempts.retain(|_, attempts| {
            attempts.retain(|t| now.duration_since(*t) < horizon);
            !attempts.is_empty()
        });
    }
}
