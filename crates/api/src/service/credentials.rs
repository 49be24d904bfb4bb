//! Credential store: user lookup, password and second-factor verification,
//! and persistence of the lockout bookkeeping the login flow produces.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_core::clock::Clock;
use gatehouse_core::error::CoreError;
use gatehouse_core::lockout::LockoutState;
use gatehouse_core::login::PasswordCheck;
use gatehouse_core::totp;
use gatehouse_core::types::{DbId, Timestamp};
use gatehouse_db::models::user::User;
use gatehouse_db::repositories::UserRepo;
use gatehouse_db::DbPool;

use crate::auth::password;

/// Identity-storage collaborator consumed by the login orchestrator.
///
/// Storage faults surface as [`CoreError::Unavailable`]; expected
/// authentication conditions are values, never errors.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch an active user by email. Deactivated and unknown accounts are
    /// indistinguishable (`None`).
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    /// Check a plaintext password against the stored hash. A matching
    /// password on a two-factor account yields
    /// [`PasswordCheck::RequiresSecondFactor`].
    async fn verify_password(&self, user: &User, password: &str)
        -> Result<PasswordCheck, CoreError>;

    /// Check a submitted one-time code against the user's secret.
    async fn verify_second_factor(&self, user: &User, code: &str) -> Result<bool, CoreError>;

    /// Persist the lockout slice computed by the core policy.
    async fn apply_lockout(&self, user_id: DbId, state: &LockoutState) -> Result<(), CoreError>;

    /// Reset the lockout counters and stamp `last_login_at`.
    async fn record_successful_login(&self, user_id: DbId, now: Timestamp)
        -> Result<(), CoreError>;
}

/// Postgres-backed [`CredentialStore`].
pub struct PgCredentialStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        UserRepo::find_active_by_email(&self.pool, email)
            .await
            .map_err(CoreError::unavailable)
    }

    async fn verify_password(
        &self,
        user: &User,
        candidate: &str,
    ) -> Result<PasswordCheck, CoreError> {
        let matches = password::verify_password(candidate, &user.password_hash)
            .map_err(|e| CoreError::Unavailable(format!("password hash unreadable: {e}")))?;

        Ok(match (matches, user.two_factor_enabled) {
            (false, _) => PasswordCheck::Invalid,
            (true, true) => PasswordCheck::RequiresSecondFactor,
            (true, false) => PasswordCheck::Valid,
        })
    }

    async fn verify_second_factor(&self, user: &User, code: &str) -> Result<bool, CoreError> {
        let Some(secret) = user.two_factor_secret.as_deref() else {
            return Ok(false);
        };
        Ok(totp::verify_code(secret, code, self.clock.now()))
    }

    async fn apply_lockout(&self, user_id: DbId, state: &LockoutState) -> Result<(), CoreError> {
        UserRepo::apply_lockout(&self.pool, user_id, state)
            .await
            .map_err(CoreError::unavailable)
    }

    async fn record_successful_login(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        UserRepo::record_successful_login(&self.pool, user_id, now)
            .await
            .map_err(CoreError::unavailable)
    }
}
