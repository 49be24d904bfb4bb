//! Handlers for the `/auth` resource: login, refresh, logout, current
//! identity, change-password, and second-factor enrolment.

use axum::extract::State;
use axum::Json;
use gatehouse_core::audit::{actions, resources};
use gatehouse_core::error::CoreError;
use gatehouse_core::login::{AuthenticatedUser, LoginOutcome};
use gatehouse_core::totp;
use gatehouse_core::types::Timestamp;
use gatehouse_db::models::user::UserResponse;
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_complexity, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientMeta;
use crate::response::MessageResponse;
use crate::service::{AuditRecord, LoginAttempt, RefreshOutcome};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        email(message = "Must be a valid Email address"),
        length(max = 256, message = "Maximum is 256 characters")
    )]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must be between 8 and 100 characters"
    ))]
    pub password: String,
    #[validate(length(equal = 6, message = "Two-factor code must be 6 digits"))]
    pub two_factor_code: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token must not be empty"))]
    pub refresh_token: String,
}

/// Request body for `POST /auth/logout`. Without a token the call revokes
/// every session the caller owns.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Request body for `POST /auth/change-password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Successful authentication response returned by login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token.
    pub expires_at: Timestamp,
    pub user: AuthenticatedUser,
}

/// Rotated token pair returned by refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
}

/// Body for the intermediate "second factor required" login state.
#[derive(Debug, Serialize)]
pub struct TwoFactorChallenge {
    pub requires_two_factor: bool,
    pub message: &'static str,
}

/// Login yields either a token pair or a pending second-factor challenge.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponseBody {
    Tokens(AuthResponse),
    TwoFactor(TwoFactorChallenge),
}

/// Response for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Response for `POST /auth/2fa/enable`.
#[derive(Debug, Serialize)]
pub struct TwoFactorSetupResponse {
    /// Base64-encoded shared secret; shown once, stored server-side.
    pub secret: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with email + password (+ optional one-time code). Returns
/// access and refresh tokens, or a pending second-factor challenge.
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponseBody>> {
    check_valid(&input)?;

    let outcome = state
        .auth
        .authenticate(LoginAttempt {
            email: input.email,
            password: input.password,
            two_factor_code: input.two_factor_code,
            remember_me: input.remember_me,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        })
        .await?;

    match outcome {
        LoginOutcome::Authenticated { tokens, user } => {
            Ok(Json(LoginResponseBody::Tokens(AuthResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: tokens.expires_at,
                user,
            })))
        }
        LoginOutcome::TwoFactorRequired => {
            Ok(Json(LoginResponseBody::TwoFactor(TwoFactorChallenge {
                requires_two_factor: true,
                message: "Two-factor authentication required",
            })))
        }
        LoginOutcome::Rejected(rejection) => {
            Err(AppError::auth_failed(rejection.public_message()))
        }
    }
}

/// POST /api/v1/auth/refresh
///
/// Exchange a live refresh token for a rotated pair. Unknown, expired,
/// used, and revoked tokens fail identically.
pub async fn refresh(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    check_valid(&input)?;

    let outcome = state
        .auth
        .refresh(&input.refresh_token, meta.ip_address, meta.user_agent)
        .await?;

    match outcome {
        RefreshOutcome::Rotated { tokens, .. } => Ok(Json(TokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        })),
        RefreshOutcome::Invalid => Err(AppError::auth_failed("Invalid refresh token")),
    }
}

/// POST /api/v1/auth/logout
///
/// Revoke the supplied refresh token, or every active session for the
/// caller when the body carries none.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    meta: ClientMeta,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<MessageResponse>> {
    let refresh_token = body.refresh_token;

    state
        .auth
        .logout(user.user_id, refresh_token, meta.ip_address)
        .await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully",
    }))
}

/// GET /api/v1/auth/me
///
/// Current identity with active roles and the distinct permissions they
/// grant.
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CurrentUserResponse>> {
    let row = UserRepo::find_by_id(&state.pool, user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "user",
            id: user.user_id,
        })?;

    let roles = RoleRepo::active_role_names(&state.pool, row.id).await?;
    let permissions = RoleRepo::active_permissions(&state.pool, row.id).await?;

    Ok(Json(CurrentUserResponse {
        user: UserResponse::from(&row),
        roles,
        permissions,
    }))
}

/// POST /api/v1/auth/change-password
///
/// Verify the current password, enforce the complexity rules, and store a
/// fresh hash. Violations come back as a message list.
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    meta: ClientMeta,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    // Collect every rule violation up front so the caller sees the full list.
    let mut errors = Vec::new();
    if input.new_password != input.confirm_password {
        errors.push("New password and confirmation do not match".to_string());
    }
    if let Err(rules) = validate_password_complexity(&input.new_password) {
        errors.extend(rules);
    }
    if !errors.is_empty() {
        return Err(AppError::Core(CoreError::Validation(errors)));
    }

    let row = UserRepo::find_by_id(&state.pool, user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "user",
            id: user.user_id,
        })?;

    let current_ok = verify_password(&input.current_password, &row.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_ok {
        state
            .audit
            .record(AuditRecord {
                action: actions::CHANGE_PASSWORD,
                resource: resources::USER,
                success: false,
                details: Some("Failed password change: current password incorrect".to_string()),
                ip_address: meta.ip_address,
                user_id: Some(user.user_id),
            })
            .await;
        return Err(AppError::Core(CoreError::Validation(vec![
            "Current password is incorrect".to_string(),
        ])));
    }

    let new_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.user_id, &new_hash).await?;

    state
        .audit
        .record(AuditRecord {
            action: actions::CHANGE_PASSWORD,
            resource: resources::USER,
            success: true,
            details: Some("Password changed successfully".to_string()),
            ip_address: meta.ip_address,
            user_id: Some(user.user_id),
        })
        .await;

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

/// POST /api/v1/auth/2fa/enable
///
/// Generate and store a fresh second-factor secret for the caller and
/// enable the factor. The secret is returned exactly once.
pub async fn enable_two_factor(
    State(state): State<AppState>,
    user: AuthUser,
    meta: ClientMeta,
) -> AppResult<Json<TwoFactorSetupResponse>> {
    let secret = totp::generate_secret();
    UserRepo::enable_two_factor(&state.pool, user.user_id, &secret).await?;

    state
        .audit
        .record(AuditRecord {
            action: actions::ENABLE_TWO_FACTOR,
            resource: resources::USER,
            success: true,
            details: Some("Two-factor authentication enabled".to_string()),
            ip_address: meta.ip_address,
            user_id: Some(user.user_id),
        })
        .await;

    Ok(Json(TwoFactorSetupResponse { secret }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run validator-derived rules, flattening violations to message strings.
fn check_valid(input: &impl Validate) -> Result<(), AppError> {
    input.validate().map_err(|errors| {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, violations)| {
                violations.iter().map(move |v| {
                    v.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"))
                })
            })
            .collect();
        messages.sort();
        AppError::Core(CoreError::Validation(messages))
    })
}
