//! Refresh token model and DTOs.

use gatehouse_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A refresh token row from the `refresh_tokens` table.
///
/// Stores only the SHA-256 hash of the opaque token value; the plaintext is
/// returned to the client once and never persisted.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    /// `jti` claim of the access token issued alongside this record.
    pub jwt_id: String,
    pub expires_at: Timestamp,
    pub is_used: bool,
    pub is_revoked: bool,
    pub revoked_at: Option<Timestamp>,
    pub revoked_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RefreshToken {
    /// A token is active while it is unused, unrevoked, and unexpired.
    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.is_used && !self.is_revoked && now < self.expires_at
    }
}

/// DTO for persisting a newly-issued refresh token.
pub struct CreateRefreshToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub jwt_id: String,
    pub expires_at: Timestamp,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
