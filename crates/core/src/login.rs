//! Login outcome vocabulary.
//!
//! The "second factor required" branch is neither success nor failure, so the
//! outcome is a tagged variant rather than flags on a success envelope --
//! tokens cannot coexist with a pending second factor by construction.

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Result of a password check against the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    /// Password matched and no second factor is configured.
    Valid,
    /// Password matched but the account requires a second factor.
    RequiresSecondFactor,
    /// Password did not match.
    Invalid,
}

/// Why a login attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    InvalidCredentials,
    LockedOut,
    InvalidTwoFactorCode,
}

impl LoginRejection {
    /// Outward-facing message. Lockout and bad-2FA wording differs for the
    /// legitimate account owner, but all three rejections share one
    /// machine-readable code at the HTTP boundary so callers cannot probe
    /// which accounts exist.
    pub fn public_message(&self) -> &'static str {
        match self {
            LoginRejection::InvalidCredentials => "Invalid credentials",
            LoginRejection::LockedOut => "Account is locked. Please try again later.",
            LoginRejection::InvalidTwoFactorCode => "Invalid two-factor authentication code.",
        }
    }
}

/// Identity summary returned with a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: DbId,
    pub username: String,
    pub email: String,
    /// Names of roles whose assignment is currently active.
    pub roles: Vec<String>,
    /// Distinct permissions granted through those roles.
    pub permissions: Vec<String>,
}

/// The freshly-minted credential pair.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token.
    pub expires_at: Timestamp,
}

/// Result of driving the login state machine to completion.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated {
        tokens: SessionTokens,
        user: AuthenticatedUser,
    },
    /// Password verified; a one-time code must be supplied to proceed.
    TwoFactorRequired,
    Rejected(LoginRejection),
}
