//! Fire-and-forget audit event sink.
//!
//! A failure to record an audit event must never abort the operation being
//! audited; the Postgres implementation logs the failure and moves on.

use async_trait::async_trait;
use gatehouse_core::types::DbId;
use gatehouse_db::models::audit::CreateAuditEvent;
use gatehouse_db::repositories::AuditRepo;
use gatehouse_db::DbPool;

/// One security event to append.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: &'static str,
    pub resource: &'static str,
    pub success: bool,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_id: Option<DbId>,
}

/// Audit collaborator consumed by the services.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditRecord);
}

/// Postgres-backed [`AuditSink`] appending to `audit_events`.
pub struct PgAuditSink {
    pool: DbPool,
}

impl PgAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditRecord) {
        let input = CreateAuditEvent {
            user_id: event.user_id,
            action: event.action.to_string(),
            resource: event.resource.to_string(),
            success: event.success,
            details: event.details,
            ip_address: event.ip_address,
        };

        if let Err(error) = AuditRepo::insert(&self.pool, &input).await {
            tracing::warn!(
                action = input.action,
                resource = input.resource,
                %error,
                "Failed to record audit event"
            );
        }
    }
}
