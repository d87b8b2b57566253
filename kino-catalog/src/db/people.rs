//! Person database operations

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::error::CatalogResult;

/// Person record (cast or crew member)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub guid: Uuid,
    pub external_id: String,
    pub name: Option<String>,
}

fn person_from_row(row: &SqliteRow) -> CatalogResult<Person> {
    let guid_str: String = row.get("guid");

    Ok(Person {
        guid: parse_guid(&guid_str)?,
        external_id: row.get("external_id"),
        name: row.get("name"),
    })
}

pub async fn load_person(pool: &SqlitePool, person_id: Uuid) -> CatalogResult<Option<Person>> {
    let row = sqlx::query("SELECT guid, external_id, name FROM people WHERE guid = ?")
        .bind(person_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(person_from_row).transpose()
}

pub async fn load_person_by_external_id(
    pool: &SqlitePool,
    external_id: &str,
) -> CatalogResult<Option<Person>> {
    let row = sqlx::query("SELECT guid, external_id, name FROM people WHERE external_id = ?")
        .bind(external_id.trim())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(person_from_row).transpose()
}

/// Movies a person is linked to, with the role held in each
pub async fn person_movies(pool: &SqlitePool, person_id: Uuid) -> CatalogResult<Vec<(Uuid, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT movie_id, role
        FROM movie_people
        WHERE person_id = ?
        ORDER BY movie_id, role
        "#,
    )
    .bind(person_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let movie_id: String = row.get("movie_id");
            Ok((parse_guid(&movie_id)?, row.get("role")))
        })
        .collect()
}

/// Number of person rows (used to verify deduplication)
pub async fn count_people(pool: &SqlitePool) -> CatalogResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM people")
        .fetch_one(pool)
        .await?)
}
