//! Authentication services and their collaborator seams.
//!
//! - [`credentials`] -- credential store contract + Postgres implementation.
//! - [`audit_sink`] -- fire-and-forget audit event sink.
//! - [`token_service`] -- token engine: issuance, rotation, revocation.
//! - [`auth_service`] -- the login orchestrator (state machine).
//!
//! The orchestrator only sees the traits, so its state machine is unit
//! tested against in-memory fakes; the Postgres implementations are
//! exercised by the HTTP integration tests.

pub mod audit_sink;
pub mod auth_service;
pub mod credentials;
pub mod token_service;

pub use audit_sink::{AuditRecord, AuditSink, PgAuditSink};
pub use auth_service::{AuthService, LoginAttempt};
pub use credentials::{CredentialStore, PgCredentialStore};
pub use token_service::{IssuedTokens, RefreshOutcome, TokenIssuer, TokenService};
