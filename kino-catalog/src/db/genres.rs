//! Genre database operations

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::natural_keys::{normalize_key, EntityKind};
use super::parse_guid;
use crate::error::CatalogResult;

/// Genre record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub guid: Uuid,
    /// Normalized name (natural key)
    pub name_key: String,
    /// Display name as last ingested
    pub name: Option<String>,
}

fn genre_from_row(row: &SqliteRow) -> CatalogResult<Genre> {
    let guid_str: String = row.get("guid");

    Ok(Genre {
        guid: parse_guid(&guid_str)?,
        name_key: row.get("name_key"),
        name: row.get("name"),
    })
}

/// Load genre by any spelling of its name
pub async fn load_genre_by_name(pool: &SqlitePool, name: &str) -> CatalogResult<Option<Genre>> {
    let key = normalize_key(EntityKind::Genre, name)?;

    let row = sqlx::query("SELECT guid, name_key, name FROM genres WHERE name_key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(genre_from_row).transpose()
}

pub async fn list_genres(pool: &SqlitePool) -> CatalogResult<Vec<Genre>> {
    let rows = sqlx::query("SELECT guid, name_key, name FROM genres ORDER BY name_key")
        .fetch_all(pool)
        .await?;

    rows.iter().map(genre_from_row).collect()
}
