//! Login orchestrator.
//!
//! Drives the authentication state machine strictly in sequence: lookup ->
//! lockout check -> password check -> second-factor gate -> issuance. Every
//! branch is audited before it returns. Expected conditions are outcomes,
//! never errors; storage faults propagate as `Unavailable` untouched.

use std::sync::Arc;

use gatehouse_core::audit::{actions, resources};
use gatehouse_core::clock::Clock;
use gatehouse_core::error::CoreError;
use gatehouse_core::login::{
    AuthenticatedUser, LoginOutcome, LoginRejection, PasswordCheck, SessionTokens,
};
use gatehouse_core::types::DbId;

use super::audit_sink::{AuditRecord, AuditSink};
use super::credentials::CredentialStore;
use super::token_service::{RefreshOutcome, TokenIssuer};

/// One inbound login request.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub email: String,
    pub password: String,
    pub two_factor_code: Option<String>,
    /// Accepted for wire compatibility; does not alter token lifetimes.
    pub remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Orchestrates login, refresh, and logout against the collaborator seams.
#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenIssuer>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenIssuer>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            audit,
            clock,
        }
    }

    /// Drive the login state machine for one attempt.
    pub async fn authenticate(&self, attempt: LoginAttempt) -> Result<LoginOutcome, CoreError> {
        let LoginAttempt {
            email,
            password,
            two_factor_code,
            remember_me: _,
            ip_address,
            user_agent,
        } = attempt;

        // 1. Lookup. Unknown and deactivated accounts take the same exit as
        //    a wrong password so the response does not reveal which emails
        //    exist.
        let Some(user) = self.credentials.find_active_by_email(&email).await? else {
            self.login_failure(
                format!("Failed login attempt for email: {email}"),
                ip_address,
                None,
            )
            .await;
            return Ok(LoginOutcome::Rejected(LoginRejection::InvalidCredentials));
        };

        // 2. Lockout gate, before any credential check is consumed.
        let now = self.clock.now();
        if user.lockout_state().is_locked_out(now) {
            self.login_failure(
                format!("Login attempt for locked user: {email}"),
                ip_address,
                Some(user.id),
            )
            .await;
            return Ok(LoginOutcome::Rejected(LoginRejection::LockedOut));
        }

        // 3. Password check.
        match self.credentials.verify_password(&user, &password).await? {
            PasswordCheck::Invalid => {
                let next = user.lockout_state().register_failure(now);
                self.credentials.apply_lockout(user.id, &next).await?;
                self.login_failure(
                    format!("Invalid password for user: {email}"),
                    ip_address,
                    Some(user.id),
                )
                .await;
                return Ok(LoginOutcome::Rejected(LoginRejection::InvalidCredentials));
            }
            PasswordCheck::RequiresSecondFactor => {
                // 4. Second-factor gate. No code yet is a valid intermediate
                //    state, not a failure.
                let Some(code) = two_factor_code.filter(|c| !c.is_empty()) else {
                    return Ok(LoginOutcome::TwoFactorRequired);
                };
                if !self.credentials.verify_second_factor(&user, &code).await? {
                    // Lockout counters stay untouched on a 2FA failure; the
                    // password was already proven.
                    self.login_failure(
                        format!("Invalid 2FA code for user: {email}"),
                        ip_address,
                        Some(user.id),
                    )
                    .await;
                    return Ok(LoginOutcome::Rejected(LoginRejection::InvalidTwoFactorCode));
                }
            }
            PasswordCheck::Valid => {}
        }

        // 5. Issuance. Any full success clears the lockout bookkeeping.
        self.credentials.record_successful_login(user.id, now).await?;
        let issued = self
            .tokens
            .issue(&user, ip_address.clone(), user_agent)
            .await?;

        self.audit
            .record(AuditRecord {
                action: actions::LOGIN,
                resource: resources::AUTHENTICATION,
                success: true,
                details: Some(format!("Successful login for user: {email}")),
                ip_address,
                user_id: Some(user.id),
            })
            .await;

        Ok(LoginOutcome::Authenticated {
            user: AuthenticatedUser {
                id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                roles: issued.roles.clone(),
                permissions: issued.permissions.clone(),
            },
            tokens: SessionTokens {
                access_token: issued.access_token,
                refresh_token: issued.refresh_token,
                expires_at: issued.expires_at,
            },
        })
    }

    /// Rotate a refresh token, auditing the result.
    pub async fn refresh(
        &self,
        token_value: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<RefreshOutcome, CoreError> {
        let outcome = self
            .tokens
            .refresh(token_value, ip_address.clone(), user_agent)
            .await?;

        match &outcome {
            RefreshOutcome::Invalid => {
                self.audit
                    .record(AuditRecord {
                        action: actions::REFRESH_TOKEN,
                        resource: resources::AUTHENTICATION,
                        success: false,
                        details: Some("Invalid refresh token attempt".to_string()),
                        ip_address,
                        user_id: None,
                    })
                    .await;
            }
            RefreshOutcome::Rotated { user_id, .. } => {
                self.audit
                    .record(AuditRecord {
                        action: actions::REFRESH_TOKEN,
                        resource: resources::AUTHENTICATION,
                        success: true,
                        details: Some("Token refreshed successfully".to_string()),
                        ip_address,
                        user_id: Some(*user_id),
                    })
                    .await;
            }
        }

        Ok(outcome)
    }

    /// Revoke the supplied refresh token, or every active session for the
    /// caller when none is supplied.
    pub async fn logout(
        &self,
        user_id: DbId,
        refresh_token: Option<String>,
        ip_address: Option<String>,
    ) -> Result<(), CoreError> {
        match refresh_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.tokens.revoke(&token, "User logout").await?;
            }
            None => {
                self.tokens
                    .revoke_all_for_user(user_id, "User logout all sessions")
                    .await?;
            }
        }

        self.audit
            .record(AuditRecord {
                action: actions::LOGOUT,
                resource: resources::AUTHENTICATION,
                success: true,
                details: Some("User logged out".to_string()),
                ip_address,
                user_id: Some(user_id),
            })
            .await;

        Ok(())
    }

    async fn login_failure(&self, details: String, ip_address: Option<String>, user_id: Option<DbId>) {
        self.audit
            .record(AuditRecord {
                action: actions::LOGIN,
                resource: resources::AUTHENTICATION,
                success: false,
                details: Some(details),
                ip_address,
                user_id,
            })
            .await;
    }
}
