//! Repository for the `audit_events` table. Insert and read-back only;
//! events are never updated or deleted by this service.

use gatehouse_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::{AuditEvent, CreateAuditEvent};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, user_id, action, resource, success, details, error_message, ip_address, created_at";

/// Provides append and query operations for audit events.
pub struct AuditRepo;

impl AuditRepo {
    /// Append one audit event, returning the stored row.
    ///
    /// On failed operations the detail text doubles as the error message.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateAuditEvent,
    ) -> Result<AuditEvent, sqlx::Error> {
        let error_message = match (&input.details, input.success) {
            (Some(details), false) => Some(details.clone()),
            _ => None,
        };

        let query = format!(
            "INSERT INTO audit_events (user_id, action, resource, success, details, error_message, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(input.user_id)
            .bind(&input.action)
            .bind(&input.resource)
            .bind(input.success)
            .bind(&input.details)
            .bind(&error_message)
            .bind(&input.ip_address)
            .fetch_one(pool)
            .await
    }

    /// Most recent events for one action, newest first.
    pub async fn list_recent_for_action(
        pool: &PgPool,
        action: &str,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_events
             WHERE action = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(action)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Most recent events attributed to one user, newest first.
    pub async fn list_recent_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_events
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
