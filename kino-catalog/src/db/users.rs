//! User database operations
//!
//! Role membership is written only through the association ledger; this
//! module reads it back alongside the user row.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::error::{CatalogError, CatalogResult};

/// User record with its role values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub guid: Uuid,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_activated: bool,
    pub roles: Vec<String>,
}

fn user_from_row(row: &SqliteRow) -> CatalogResult<User> {
    let guid_str: String = row.get("guid");
    let is_activated: i64 = row.get("is_activated");

    Ok(User {
        guid: parse_guid(&guid_str)?,
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        is_activated: is_activated != 0,
        roles: Vec::new(),
    })
}

async fn with_roles(pool: &SqlitePool, mut user: User) -> CatalogResult<User> {
    user.roles = user_role_values(pool, user.guid).await?;
    Ok(user)
}

/// Insert a user row inside the caller's transaction
pub async fn insert_user_in(
    conn: &mut SqliteConnection,
    email: &str,
    phone_number: Option<&str>,
) -> CatalogResult<Uuid> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CatalogError::InvalidInput("Email must not be empty".to_string()));
    }

    let guid = Uuid::new_v4();
    let result = sqlx::query(
        r#"
        INSERT INTO users (guid, email, phone_number)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(email)
    .bind(phone_number)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(guid),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            CatalogError::InvalidInput(format!("User with email {} already exists", email)),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Role values held by a user
pub async fn user_role_values(pool: &SqlitePool, user_id: Uuid) -> CatalogResult<Vec<String>> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT r.value
        FROM user_roles ur
        JOIN roles r ON r.guid = ur.role_id
        WHERE ur.user_id = ?
        ORDER BY r.value
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?)
}

pub async fn load_user(pool: &SqlitePool, user_id: Uuid) -> CatalogResult<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, email, phone_number, is_activated FROM users WHERE guid = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(with_roles(pool, user_from_row(&row)?).await?)),
        None => Ok(None),
    }
}

pub async fn load_user_by_email(pool: &SqlitePool, email: &str) -> CatalogResult<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, email, phone_number, is_activated FROM users WHERE email = ?",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(with_roles(pool, user_from_row(&row)?).await?)),
        None => Ok(None),
    }
}

pub async fn list_users(pool: &SqlitePool) -> CatalogResult<Vec<User>> {
    let rows = sqlx::query(
        "SELECT guid, email, phone_number, is_activated FROM users ORDER BY email",
    )
    .fetch_all(pool)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        users.push(with_roles(pool, user_from_row(row)?).await?);
    }
    Ok(users)
}

/// Update phone number; returns false if the user does not exist
pub async fn update_phone(
    pool: &SqlitePool,
    user_id: Uuid,
    phone_number: Option<&str>,
) -> CatalogResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET phone_number = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(phone_number)
    .bind(user_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a user row (role links cascade)
pub async fn delete_user(pool: &SqlitePool, user_id: Uuid) -> CatalogResult<bool> {
    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
