//! Role, permission, and user-claim models.
//!
//! These exist only so token issuance can resolve the caller's active roles,
//! the distinct permissions they grant, and any custom claims. Role and
//! permission administration is owned elsewhere.

use gatehouse_core::types::DbId;
use sqlx::FromRow;

/// A role row from the `roles` table.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: DbId,
    pub name: String,
}

/// A custom claim attached to a user, folded into issued access tokens.
#[derive(Debug, Clone, FromRow)]
pub struct UserClaim {
    pub claim_type: String,
    pub claim_value: String,
}
