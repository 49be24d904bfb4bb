//! User entity model and DTOs.

use gatehouse_core::lockout::LockoutState;
use gatehouse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash and the second-factor secret -- NEVER
/// serialize this to API responses directly. Use [`UserResponse`] for
/// external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<Timestamp>,
    pub login_attempts: i32,
    pub lockout_count: i32,
    pub lockout_end_at: Option<Timestamp>,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// The lockout-relevant slice of this row, for the core policy.
    pub fn lockout_state(&self) -> LockoutState {
        LockoutState {
            login_attempts: self.login_attempts,
            lockout_count: self.lockout_count,
            lockout_end_at: self.lockout_end_at,
        }
    }
}

/// Safe user representation for API responses (no secrets).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            two_factor_enabled: user.two_factor_enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
