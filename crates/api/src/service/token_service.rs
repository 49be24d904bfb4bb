//! Token engine: mints signed access tokens and opaque rotating refresh
//! tokens, and owns their revocation lifecycle.
//!
//! Refresh-token consumption must be linearizable per token value: the
//! engine leans on [`RefreshTokenRepo::consume`], a single conditional
//! UPDATE, so of two racing refresh calls exactly one rotates the session
//! and the other uniformly observes `Invalid`.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_core::clock::Clock;
use gatehouse_core::error::CoreError;
use gatehouse_core::types::{DbId, Timestamp};
use gatehouse_db::models::refresh_token::CreateRefreshToken;
use gatehouse_db::models::user::User;
use gatehouse_db::repositories::{RefreshTokenRepo, RoleRepo, UserRepo};
use gatehouse_db::DbPool;

use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, hash_refresh_token, JwtConfig, TokenSubject,
};

/// A freshly-minted credential pair plus the identity data resolved while
/// minting it.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token.
    pub expires_at: Timestamp,
    /// Names of roles whose assignment was active at issuance.
    pub roles: Vec<String>,
    /// Distinct permissions granted through those roles.
    pub permissions: Vec<String>,
}

/// Result of attempting to rotate a refresh token.
///
/// `Invalid` covers unknown, expired, already-used, and revoked tokens
/// uniformly; callers cannot distinguish why a token failed.
#[derive(Debug)]
pub enum RefreshOutcome {
    Rotated { user_id: DbId, tokens: IssuedTokens },
    Invalid,
}

/// Token engine contract consumed by the login orchestrator and handlers.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mint a new access + refresh token pair for the user.
    async fn issue(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<IssuedTokens, CoreError>;

    /// Consume a refresh token and mint a replacement pair (full rotation).
    async fn refresh(
        &self,
        token_value: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<RefreshOutcome, CoreError>;

    /// Revoke one active refresh token. Revoking an inactive token is a
    /// no-op, not an error.
    async fn revoke(&self, token_value: &str, reason: &str) -> Result<(), CoreError>;

    /// Revoke every active refresh token belonging to a user. Returns the
    /// count revoked.
    async fn revoke_all_for_user(&self, user_id: DbId, reason: &str) -> Result<u64, CoreError>;

    /// Whether an active record exists for the token value.
    async fn is_active(&self, token_value: &str) -> Result<bool, CoreError>;
}

/// Postgres-backed [`TokenIssuer`]. Sole holder of the signing key.
pub struct TokenService {
    pool: DbPool,
    jwt: JwtConfig,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(pool: DbPool, jwt: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self { pool, jwt, clock }
    }

    /// Resolve the user's active roles, permissions, and custom claims.
    async fn resolve_identity(
        &self,
        user_id: DbId,
    ) -> Result<(Vec<String>, Vec<String>, serde_json::Map<String, serde_json::Value>), CoreError>
    {
        let roles = RoleRepo::active_role_names(&self.pool, user_id)
            .await
            .map_err(CoreError::unavailable)?;
        let permissions = RoleRepo::active_permissions(&self.pool, user_id)
            .await
            .map_err(CoreError::unavailable)?;

        let mut extra = serde_json::Map::new();
        for claim in RoleRepo::claims_for_user(&self.pool, user_id)
            .await
            .map_err(CoreError::unavailable)?
        {
            extra.insert(claim.claim_type, serde_json::Value::String(claim.claim_value));
        }

        Ok((roles, permissions, extra))
    }

    /// Mint both tokens and persist the refresh record correlated by `jti`.
    async fn mint(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<IssuedTokens, CoreError> {
        let now = self.clock.now();
        let (roles, permissions, extra) = self.resolve_identity(user.id).await?;

        let subject = TokenSubject {
            user_id: user.id,
            username: &user.username,
            email: &user.email,
        };
        let (access_token, jwt_id) =
            generate_access_token(&subject, roles.clone(), extra, &self.jwt, now)
                .map_err(|e| CoreError::Unavailable(format!("token signing failed: {e}")))?;

        let (refresh_plaintext, refresh_hash) = generate_refresh_token();
        let record = CreateRefreshToken {
            user_id: user.id,
            token_hash: refresh_hash,
            jwt_id,
            expires_at: now + self.jwt.refresh_token_lifetime(),
            ip_address,
            user_agent,
        };
        RefreshTokenRepo::create(&self.pool, &record)
            .await
            .map_err(CoreError::unavailable)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: refresh_plaintext,
            expires_at: now + self.jwt.access_token_lifetime(),
            roles,
            permissions,
        })
    }
}

#[async_trait]
impl TokenIssuer for TokenService {
    async fn issue(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<IssuedTokens, CoreError> {
        self.mint(user, ip_address, user_agent).await
    }

    async fn refresh(
        &self,
        token_value: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<RefreshOutcome, CoreError> {
        let now = self.clock.now();
        let hash = hash_refresh_token(token_value);

        // Single-use enforcement: the conditional UPDATE is the linearization
        // point. A loser of the race lands in the `None` arm like any other
        // dead token.
        let consumed = RefreshTokenRepo::consume(&self.pool, &hash, now)
            .await
            .map_err(CoreError::unavailable)?;
        let Some(record) = consumed else {
            return Ok(RefreshOutcome::Invalid);
        };

        let user = UserRepo::find_by_id(&self.pool, record.user_id)
            .await
            .map_err(CoreError::unavailable)?;
        let Some(user) = user.filter(|u| u.is_active) else {
            // The session owner vanished or was deactivated since issuance.
            return Ok(RefreshOutcome::Invalid);
        };

        let tokens = self.mint(&user, ip_address, user_agent).await?;
        Ok(RefreshOutcome::Rotated {
            user_id: user.id,
            tokens,
        })
    }

    async fn revoke(&self, token_value: &str, reason: &str) -> Result<(), CoreError> {
        let hash = hash_refresh_token(token_value);
        RefreshTokenRepo::revoke(&self.pool, &hash, reason, self.clock.now())
            .await
            .map_err(CoreError::unavailable)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: DbId, reason: &str) -> Result<u64, CoreError> {
        RefreshTokenRepo::revoke_all_for_user(&self.pool, user_id, reason, self.clock.now())
            .await
            .map_err(CoreError::unavailable)
    }

    async fn is_active(&self, token_value: &str) -> Result<bool, CoreError> {
        let hash = hash_refresh_token(token_value);
        RefreshTokenRepo::is_active(&self.pool, &hash, self.clock.now())
            .await
            .map_err(CoreError::unavailable)
    }
}
