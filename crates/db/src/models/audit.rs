//! Audit event model. Append-only; rows are never updated.

use gatehouse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A single audit event.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub action: String,
    pub resource: String,
    pub success: bool,
    pub details: Option<String>,
    /// Populated from `details` on failed operations, mirroring how the
    /// detail text doubles as the error description.
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending a new audit event.
#[derive(Debug, Clone)]
pub struct CreateAuditEvent {
    pub user_id: Option<DbId>,
    pub action: String,
    pub resource: String,
    pub success: bool,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}
