//! Role database operations

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::error::{CatalogError, CatalogResult};

/// Role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub guid: Uuid,
    /// Unique role value (e.g. "ADMIN")
    pub value: String,
    pub description: String,
}

fn role_from_row(row: &SqliteRow) -> CatalogResult<Role> {
    let guid_str: String = row.get("guid");

    Ok(Role {
        guid: parse_guid(&guid_str)?,
        value: row.get("value"),
        description: row.get("description"),
    })
}

/// Create a role
///
/// Values are trimmed; a duplicate value is rejected with `InvalidInput`.
pub async fn create_role(pool: &SqlitePool, value: &str, description: &str) -> CatalogResult<Role> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::InvalidInput("Role value must not be empty".to_string()));
    }

    let guid = Uuid::new_v4();
    let result = sqlx::query("INSERT INTO roles (guid, value, description) VALUES (?, ?, ?)")
        .bind(guid.to_string())
        .bind(value)
        .bind(description)
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(Role {
            guid,
            value: value.to_string(),
            description: description.to_string(),
        }),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            CatalogError::InvalidInput(format!("Role \"{}\" already exists", value)),
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_role_by_value(pool: &SqlitePool, value: &str) -> CatalogResult<Option<Role>> {
    let row = sqlx::query("SELECT guid, value, description FROM roles WHERE value = ?")
        .bind(value.trim())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(role_from_row).transpose()
}

pub async fn list_roles(pool: &SqlitePool) -> CatalogResult<Vec<Role>> {
    let rows = sqlx::query("SELECT guid, value, description FROM roles ORDER BY value")
        .fetch_all(pool)
        .await?;

    rows.iter().map(role_from_row).collect()
}
