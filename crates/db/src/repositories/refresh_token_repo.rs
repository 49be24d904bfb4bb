//! Repository for the `refresh_tokens` table.

use gatehouse_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::refresh_token::{CreateRefreshToken, RefreshToken};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token_hash, jwt_id, expires_at, is_used, is_revoked, \
                        revoked_at, revoked_reason, ip_address, user_agent, \
                        created_at, updated_at";

/// Condition selecting the active record for a hash (unused, unrevoked,
/// unexpired). Queries using it bind `$1` = token hash, `$2` = now.
const ACTIVE_BY_HASH: &str =
    "token_hash = $1 AND is_used = false AND is_revoked = false AND expires_at > $2";

/// Provides persistence operations for refresh tokens.
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    /// Insert a newly-issued token record, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRefreshToken,
    ) -> Result<RefreshToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO refresh_tokens (user_id, token_hash, jwt_id, expires_at, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(&input.jwt_id)
            .bind(input.expires_at)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .fetch_one(pool)
            .await
    }

    /// Atomically consume an active token: flip `is_used` to true and return
    /// the row, in one conditional UPDATE.
    ///
    /// Exactly one of any number of concurrent callers for the same hash
    /// observes the active record and wins; every other caller (and any
    /// unknown, expired, already-used, or revoked hash) gets `None`.
    pub async fn consume(
        pool: &PgPool,
        token_hash: &str,
        now: Timestamp,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let query = format!(
            "UPDATE refresh_tokens SET is_used = true, updated_at = NOW()
             WHERE {ACTIVE_BY_HASH}
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Whether an active record exists for the hash.
    pub async fn is_active(
        pool: &PgPool,
        token_hash: &str,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE {ACTIVE_BY_HASH})");
        sqlx::query_scalar::<_, bool>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Revoke one active token. Revoking an inactive token is a no-op;
    /// returns `true` only when a row was transitioned.
    pub async fn revoke(
        pool: &PgPool,
        token_hash: &str,
        reason: &str,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE refresh_tokens SET
                is_revoked = true, revoked_at = $2, revoked_reason = $3, updated_at = NOW()
             WHERE {ACTIVE_BY_HASH}"
        );
        let result = sqlx::query(&query)
            .bind(token_hash)
            .bind(now)
            .bind(reason)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active token belonging to a user ("logout everywhere").
    /// Returns the count of revoked records.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET
                is_revoked = true, revoked_at = $2, revoked_reason = $3, updated_at = NOW()
             WHERE user_id = $1
               AND is_used = false AND is_revoked = false AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a token record by hash regardless of state (forensic lookups
    /// and tests).
    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete expired or consumed records. Returns the count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at < $1 OR is_used = true OR is_revoked = true",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
