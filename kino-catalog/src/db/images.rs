//! Image database operations
//!
//! Backing store for the local image collaborator. The image set of a movie
//! is replaced as a whole, keyed by url.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::parse_guid;
use crate::error::{CatalogError, CatalogResult};

/// Stored image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub guid: Uuid,
    pub movie_id: Uuid,
    pub url: String,
    pub kind: String,
}

/// Image as supplied by an ingested record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    pub url: String,
    #[serde(default = "default_image_kind")]
    pub kind: String,
}

fn default_image_kind() -> String {
    "poster".to_string()
}

fn image_from_row(row: &SqliteRow) -> CatalogResult<ImageRef> {
    let guid_str: String = row.get("guid");
    let movie_str: String = row.get("movie_id");

    Ok(ImageRef {
        guid: parse_guid(&guid_str)?,
        movie_id: parse_guid(&movie_str)?,
        url: row.get("url"),
        kind: row.get("kind"),
    })
}

pub async fn images_for_movie(pool: &SqlitePool, movie_id: Uuid) -> CatalogResult<Vec<ImageRef>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, movie_id, url, kind
        FROM images
        WHERE movie_id = ?
        ORDER BY kind, url
        "#,
    )
    .bind(movie_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(image_from_row).collect()
}

/// Replace the image set of a movie inside the caller's transaction
///
/// Urls are trimmed and deduplicated; the last entry for a url decides its
/// kind. Returns (added, removed) counts.
pub async fn replace_movie_images_in(
    conn: &mut SqliteConnection,
    movie_id: Uuid,
    images: &[NewImage],
) -> CatalogResult<(usize, usize)> {
    let movie_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM movies WHERE guid = ?")
        .bind(movie_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    if movie_exists.is_none() {
        return Err(CatalogError::not_found("Movie", movie_id));
    }

    let mut target: BTreeMap<String, String> = BTreeMap::new();
    for image in images {
        let url = image.url.trim();
        if url.is_empty() {
            return Err(CatalogError::InvalidInput("Image url must not be empty".to_string()));
        }
        let kind = image.kind.trim();
        let kind = if kind.is_empty() { "poster" } else { kind };
        target.insert(url.to_string(), kind.to_string());
    }

    let existing: Vec<String> = sqlx::query_scalar("SELECT url FROM images WHERE movie_id = ?")
        .bind(movie_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    let mut removed = 0;
    for url in existing.iter().filter(|url| !target.contains_key(*url)) {
        removed += sqlx::query("DELETE FROM images WHERE movie_id = ? AND url = ?")
            .bind(movie_id.to_string())
            .bind(url)
            .execute(&mut *conn)
            .await?
            .rows_affected() as usize;
    }

    let mut added = 0;
    for (url, kind) in &target {
        let result = sqlx::query(
            r#"
            INSERT INTO images (guid, movie_id, url, kind)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (movie_id, url) DO UPDATE SET kind = excluded.kind
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(movie_id.to_string())
        .bind(url)
        .bind(kind)
        .execute(&mut *conn)
        .await?;

        if !existing.contains(url) && result.rows_affected() > 0 {
            added += 1;
        }
    }

    Ok((added, removed))
}
