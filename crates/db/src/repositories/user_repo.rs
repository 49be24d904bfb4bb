//! Repository for the `users` table.

use gatehouse_core::lockout::LockoutState;
use gatehouse_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, password_hash, is_active, last_login_at, \
                        login_attempts, lockout_count, lockout_end_at, \
                        two_factor_enabled, two_factor_secret, created_at, updated_at";

/// Provides query and mutation operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active user by email (case-insensitive).
    ///
    /// Deactivated accounts are invisible to this lookup, so they fail a
    /// login the same way an unknown address does.
    pub async fn find_active_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1) AND is_active");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Persist the lockout slice computed by the core policy.
    pub async fn apply_lockout(
        pool: &PgPool,
        id: DbId,
        state: &LockoutState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                login_attempts = $2,
                lockout_count = $3,
                lockout_end_at = $4,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(state.login_attempts)
        .bind(state.lockout_count)
        .bind(state.lockout_end_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a full login success: reset the lockout counters, clear any
    /// open window, and stamp `last_login_at`.
    pub async fn record_successful_login(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                login_attempts = 0,
                lockout_count = 0,
                lockout_end_at = NULL,
                last_login_at = $2,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update a user's password hash. Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a fresh second-factor secret and mark the factor enabled.
    pub async fn enable_two_factor(
        pool: &PgPool,
        id: DbId,
        secret: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                two_factor_enabled = true,
                two_factor_secret = $2,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(secret)
        .execute(pool)
        .await?;
        Ok(())
    }
}
