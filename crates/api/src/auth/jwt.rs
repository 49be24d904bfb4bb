//! JWT access-token generation/validation and refresh-token helpers.
//!
//! Access tokens are HS512-signed JWTs containing a [`Claims`] payload.
//! Refresh tokens are opaque random values (64 bytes of entropy, base64);
//! only their SHA-256 hash is stored server-side so a database leak does
//! not compromise active sessions.

use base64ct::{Base64, Encoding};
use gatehouse_core::hashing::sha256_hex;
use gatehouse_core::types::{DbId, Timestamp};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bytes of entropy in an opaque refresh-token value.
const REFRESH_TOKEN_BYTES: usize = 64;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    pub username: String,
    pub email: String,
    /// One entry per currently-active role assignment.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Unique token identifier (UUID v7), also stored on the paired
    /// refresh-token record as the correlation key.
    pub jti: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Not-before time (UTC Unix timestamp).
    pub nbf: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Custom claims attached to the user, flattened into the payload.
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Configuration for token generation and validation.
///
/// Built once at startup and injected; the signing secret never leaves the
/// token engine.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA512 secret used to sign and verify tokens.
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default              |
    /// |----------------------------|----------|----------------------|
    /// | `JWT_SECRET`               | **yes**  | --                   |
    /// | `JWT_ISSUER`               | no       | `gatehouse`          |
    /// | `JWT_AUDIENCE`             | no       | `gatehouse-clients`  |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`                 |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`                  |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gatehouse".into());
        let audience = std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "gatehouse-clients".into());

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            issuer,
            audience,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        }
    }

    /// Access-token lifetime as a duration.
    pub fn access_token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expiry_mins)
    }

    /// Refresh-token lifetime as a duration.
    pub fn refresh_token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expiry_days)
    }
}

/// Identity fields baked into an access token.
pub struct TokenSubject<'a> {
    pub user_id: DbId,
    pub username: &'a str,
    pub email: &'a str,
}

/// Generate an HS512 access token for the given subject.
///
/// Returns the encoded token together with its `jti`, which the caller
/// stores on the paired refresh-token record. `exp` is exactly
/// `now + access_token_expiry_mins`.
pub fn generate_access_token(
    subject: &TokenSubject<'_>,
    roles: Vec<String>,
    extra: serde_json::Map<String, serde_json::Value>,
    config: &JwtConfig,
    now: Timestamp,
) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let jti = Uuid::now_v7().to_string();
    let issued_at = now.timestamp();
    let expires_at = (now + config.access_token_lifetime()).timestamp();

    let claims = Claims {
        sub: subject.user_id,
        username: subject.username.to_string(),
        email: subject.email.to_string(),
        roles,
        jti: jti.clone(),
        iat: issued_at,
        nbf: issued_at,
        exp: expires_at,
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        extra,
    };

    let token = encode(
        &Header::new(Algorithm::HS512),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok((token, jti))
}

/// Validate and decode an access token, returning the embedded [`Claims`].
///
/// Checks the signature, expiration, not-before, issuer, and audience.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS512);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Generate a cryptographically random refresh token.
///
/// Returns a tuple of `(plaintext_token, sha256_hex_hash)`. The plaintext is
/// sent to the client exactly once; only the hash is persisted.
pub fn generate_refresh_token() -> (String, String) {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let plaintext = Base64::encode_string(&bytes);
    let hash = hash_refresh_token(&plaintext);
    (plaintext, hash)
}

/// Compute the SHA-256 hex digest of a refresh token.
///
/// Use this to compare an incoming refresh token against the stored hash.
pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}
