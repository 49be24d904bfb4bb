//! Progressive account-lockout policy.
//!
//! After [`MAX_LOGIN_ATTEMPTS`] consecutive password failures the account is
//! locked for `5 minutes x lockout_count`, where `lockout_count` counts
//! completed lockout episodes rather than raw failures. Each new episode is
//! therefore longer than the last. The policy is pure state arithmetic; the
//! login orchestrator applies the result and the repository persists it.

use crate::types::Timestamp;

/// Consecutive failed password checks before the account locks.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;

/// Base lockout duration in minutes, scaled by the episode count.
pub const LOCKOUT_BASE_MINUTES: i64 = 5;

/// The lockout-relevant slice of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub login_attempts: i32,
    pub lockout_count: i32,
    pub lockout_end_at: Option<Timestamp>,
}

impl LockoutState {
    /// A user who has never failed a login.
    pub fn clear() -> Self {
        Self {
            login_attempts: 0,
            lockout_count: 0,
            lockout_end_at: None,
        }
    }

    /// A `lockout_end_at` in the future means locked out, regardless of the
    /// current attempt counter.
    pub fn is_locked_out(&self, now: Timestamp) -> bool {
        matches!(self.lockout_end_at, Some(end) if end > now)
    }

    /// Register one failed password check, returning the next state.
    ///
    /// On reaching the attempt threshold the episode counter increments
    /// (only when no lockout window is already running), a new window of
    /// `LOCKOUT_BASE_MINUTES x lockout_count` opens, and the attempt counter
    /// resets to zero.
    pub fn register_failure(mut self, now: Timestamp) -> Self {
        self.login_attempts += 1;
        if self.login_attempts >= MAX_LOGIN_ATTEMPTS {
            if !self.is_locked_out(now) {
                self.lockout_count += 1;
            }
            let window = chrono::Duration::minutes(LOCKOUT_BASE_MINUTES * self.lockout_count as i64);
            self.lockout_end_at = Some(now + window);
            self.login_attempts = 0;
        }
        self
    }

    /// Duration of the currently-open lockout window, if any.
    pub fn remaining(&self, now: Timestamp) -> Option<chrono::Duration> {
        match self.lockout_end_at {
            Some(end) if end > now => Some(end - now),
            _ => None,
        }
    }
}
