//! Repository for roles, permissions, and user claims.
//!
//! Read side of the role/permission arena: token issuance resolves names
//! through here; assignment exists so tests and seed tooling can wire users
//! to roles.

use gatehouse_core::types::DbId;
use sqlx::PgPool;

use crate::models::role::{Role, UserClaim};

/// Provides resolution queries for roles, permissions, and claims.
pub struct RoleRepo;

impl RoleRepo {
    /// Find a role by name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Assign a role to a user. The assignment starts active.
    pub async fn assign_to_user(
        pool: &PgPool,
        user_id: DbId,
        role_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Names of the roles whose assignment to this user is currently active.
    pub async fn active_role_names(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = $1 AND ur.is_active = true
             ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Distinct permissions granted through the user's active role
    /// assignments.
    pub async fn active_permissions(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT p.full_permission FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             JOIN user_roles ur ON ur.role_id = rp.role_id
             WHERE ur.user_id = $1 AND ur.is_active = true
             ORDER BY p.full_permission",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Custom claims attached to the user, folded into access tokens.
    pub async fn claims_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserClaim>, sqlx::Error> {
        sqlx::query_as::<_, UserClaim>(
            "SELECT claim_type, claim_value FROM user_claims WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
