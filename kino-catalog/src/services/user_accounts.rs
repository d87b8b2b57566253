//! User accounts and role membership
//!
//! Every user is born with the `USER` role, linked in the same transaction
//! as the user row. That role can never be added or removed afterwards;
//! all other role changes go through `apply_role`.

use chrono::Utc;
use kino_common::db::DEFAULT_USER_ROLE;
use kino_common::events::{CatalogEvent, EventBus, RoleChange};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::roles::{self, Role};
use crate::db::users::{self, User};
use crate::error::{CatalogError, CatalogResult};
use crate::services::association_ledger::{
    add_in, AssociationKind, AssociationLedger, Guard, Link, LinkOp,
};
use crate::utils::{begin_monitored, retry_on_lock};

/// Role value to add to or remove from a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    pub value: String,
}

/// Role membership operation
pub type RoleOp = LinkOp;

/// Result of `apply_role`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleChangeOutcome {
    pub user_id: Uuid,
    pub value: String,
    pub op: RoleOp,
    /// False if the user already had (or already lacked) the role
    pub changed: bool,
}

#[derive(Clone)]
pub struct UserAccounts {
    db: SqlitePool,
    ledger: AssociationLedger,
    event_bus: EventBus,
    max_lock_wait_ms: u64,
}

impl UserAccounts {
    pub fn new(
        db: SqlitePool,
        ledger: AssociationLedger,
        event_bus: EventBus,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            db,
            ledger,
            event_bus,
            max_lock_wait_ms,
        }
    }

    /// Create a user holding the default role
    pub async fn create_user(&self, email: &str, phone_number: Option<&str>) -> CatalogResult<User> {
        let default_role = roles::get_role_by_value(&self.db, DEFAULT_USER_ROLE)
            .await?
            .ok_or_else(|| CatalogError::not_found("Role", DEFAULT_USER_ROLE))?;

        let pool = &self.db;
        let role_id = default_role.guid;
        let user_id = retry_on_lock("user_accounts::create_user", self.max_lock_wait_ms, || async {
            let mut tx = begin_monitored(pool, "user_accounts::create_user").await?;
            let user_id = users::insert_user_in(tx.conn(), email, phone_number).await?;
            add_in(
                tx.conn(),
                AssociationKind::UserRoles,
                user_id,
                &Link::new(role_id),
                Guard::CreationTime,
            )
            .await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(user_id)
        })
        .await?;

        info!(user_id = %user_id, "User created");
        self.event_bus.emit_lossy(CatalogEvent::UserCreated {
            user_id,
            timestamp: Utc::now(),
        });

        self.get_user_by_id(user_id).await
    }

    pub async fn get_all_users(&self) -> CatalogResult<Vec<User>> {
        users::list_users(&self.db).await
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> CatalogResult<User> {
        users::load_user(&self.db, user_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("User", user_id))
    }

    pub async fn get_user_by_email(&self, email: &str) -> CatalogResult<User> {
        users::load_user_by_email(&self.db, email)
            .await?
            .ok_or_else(|| CatalogError::not_found("User", email))
    }

    pub async fn update_user_phone(
        &self,
        user_id: Uuid,
        phone_number: Option<&str>,
    ) -> CatalogResult<User> {
        if !users::update_phone(&self.db, user_id, phone_number).await? {
            return Err(CatalogError::not_found("User", user_id));
        }
        self.get_user_by_id(user_id).await
    }

    /// Delete a user and return the deleted record
    pub async fn delete_user(&self, user_id: Uuid) -> CatalogResult<User> {
        let user = self.get_user_by_id(user_id).await?;
        users::delete_user(&self.db, user_id).await?;
        info!(user_id = %user_id, "User deleted");
        Ok(user)
    }

    pub async fn create_role(&self, value: &str, description: &str) -> CatalogResult<Role> {
        roles::create_role(&self.db, value, description).await
    }

    pub async fn list_roles(&self) -> CatalogResult<Vec<Role>> {
        roles::list_roles(&self.db).await
    }

    pub async fn get_role_by_value(&self, value: &str) -> CatalogResult<Role> {
        roles::get_role_by_value(&self.db, value)
            .await?
            .ok_or_else(|| CatalogError::not_found("Role", value.trim()))
    }

    /// Add or remove a role
    ///
    /// Checked in order: protected value, role exists, user exists.
    pub async fn apply_role(
        &self,
        assignment: &RoleAssignment,
        op: RoleOp,
    ) -> CatalogResult<RoleChangeOutcome> {
        let value = assignment.value.trim();
        if AssociationKind::UserRoles.is_protected(value) {
            return Err(CatalogError::ProtectedValue(value.to_string()));
        }

        let role = self.get_role_by_value(value).await?;
        let changed = self
            .ledger
            .apply(
                AssociationKind::UserRoles,
                assignment.user_id,
                &Link::new(role.guid),
                op,
            )
            .await?;

        if changed {
            let change = match op {
                LinkOp::Add => RoleChange::Added,
                LinkOp::Remove => RoleChange::Removed,
            };
            info!(user_id = %assignment.user_id, role = %role.value, ?change, "User role changed");
            self.event_bus.emit_lossy(CatalogEvent::UserRoleChanged {
                user_id: assignment.user_id,
                role: role.value.clone(),
                change,
                timestamp: Utc::now(),
            });
        }

        Ok(RoleChangeOutcome {
            user_id: assignment.user_id,
            value: role.value,
            op,
            changed,
        })
    }
}
