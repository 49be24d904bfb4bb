//! Shared response envelope types for API handlers.

use serde::Serialize;

/// Standard `{ "message": ... }` acknowledgement body for operations that
/// return no data (logout, change-password).
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
