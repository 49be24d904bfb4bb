use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Dependency unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    /// Wrap a storage or dependency failure as [`CoreError::Unavailable`].
    ///
    /// Expected auth conditions never use this path; it is reserved for
    /// faults the caller cannot act on (retry policy lives upstream).
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        CoreError::Unavailable(err.to_string())
    }
}
