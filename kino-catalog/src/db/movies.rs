//! Movie database operations
//!
//! Movie rows plus the joined reads over movie_people and movie_genres.
//! Writes go through the entity resolver and the association ledger.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::error::CatalogResult;

/// Movie record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub guid: Uuid,
    /// External source id (natural key)
    pub external_id: String,
    pub title: Option<String>,
    pub release_year: Option<i64>,
}

/// Person linked to a movie under one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastMember {
    pub person_id: Uuid,
    pub external_id: String,
    pub name: Option<String>,
    pub role: String,
}

/// Genre linked to a movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRef {
    pub genre_id: Uuid,
    pub name: Option<String>,
}

fn movie_from_row(row: &SqliteRow) -> CatalogResult<Movie> {
    let guid_str: String = row.get("guid");

    Ok(Movie {
        guid: parse_guid(&guid_str)?,
        external_id: row.get("external_id"),
        title: row.get("title"),
        release_year: row.get("release_year"),
    })
}

/// Load movie by internal id
pub async fn load_movie(pool: &SqlitePool, movie_id: Uuid) -> CatalogResult<Option<Movie>> {
    let row = sqlx::query(
        r#"
        SELECT guid, external_id, title, release_year
        FROM movies
        WHERE guid = ?
        "#,
    )
    .bind(movie_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(movie_from_row).transpose()
}

/// Load movie by external source id
pub async fn load_movie_by_external_id(
    pool: &SqlitePool,
    external_id: &str,
) -> CatalogResult<Option<Movie>> {
    let row = sqlx::query(
        r#"
        SELECT guid, external_id, title, release_year
        FROM movies
        WHERE external_id = ?
        "#,
    )
    .bind(external_id.trim())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(movie_from_row).transpose()
}

/// All movies, ordered by title
pub async fn list_movies(pool: &SqlitePool) -> CatalogResult<Vec<Movie>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, external_id, title, release_year
        FROM movies
        ORDER BY title COLLATE NOCASE, external_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(movie_from_row).collect()
}

/// People linked to a movie, ordered by role then name
pub async fn movie_people(pool: &SqlitePool, movie_id: Uuid) -> CatalogResult<Vec<CastMember>> {
    let rows = sqlx::query(
        r#"
        SELECT p.guid, p.external_id, p.name, mp.role
        FROM movie_people mp
        JOIN people p ON p.guid = mp.person_id
        WHERE mp.movie_id = ?
        ORDER BY mp.role, p.name COLLATE NOCASE, p.external_id
        "#,
    )
    .bind(movie_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid_str: String = row.get("guid");
            Ok(CastMember {
                person_id: parse_guid(&guid_str)?,
                external_id: row.get("external_id"),
                name: row.get("name"),
                role: row.get("role"),
            })
        })
        .collect()
}

/// Genres linked to a movie, ordered by name
pub async fn movie_genres(pool: &SqlitePool, movie_id: Uuid) -> CatalogResult<Vec<GenreRef>> {
    let rows = sqlx::query(
        r#"
        SELECT g.guid, g.name
        FROM movie_genres mg
        JOIN genres g ON g.guid = mg.genre_id
        WHERE mg.movie_id = ?
        ORDER BY g.name_key
        "#,
    )
    .bind(movie_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid_str: String = row.get("guid");
            Ok(GenreRef {
                genre_id: parse_guid(&guid_str)?,
                name: row.get("name"),
            })
        })
        .collect()
}
