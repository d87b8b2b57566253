//! Review database operations

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::error::{CatalogError, CatalogResult};

/// Review record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub guid: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub text: String,
    pub rate: i64,
}

/// Direction of a rate change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateChange {
    Increase,
    Decrease,
}

impl RateChange {
    fn delta(self) -> i64 {
        match self {
            RateChange::Increase => 1,
            RateChange::Decrease => -1,
        }
    }
}

fn review_from_row(row: &SqliteRow) -> CatalogResult<Review> {
    let guid_str: String = row.get("guid");
    let movie_str: String = row.get("movie_id");
    let user_str: String = row.get("user_id");

    Ok(Review {
        guid: parse_guid(&guid_str)?,
        movie_id: parse_guid(&movie_str)?,
        user_id: parse_guid(&user_str)?,
        title: row.get("title"),
        text: row.get("text"),
        rate: row.get("rate"),
    })
}

pub async fn create_review(
    pool: &SqlitePool,
    movie_id: Uuid,
    user_id: Uuid,
    title: &str,
    text: &str,
) -> CatalogResult<Review> {
    if text.trim().is_empty() {
        return Err(CatalogError::InvalidInput("Review text must not be empty".to_string()));
    }

    let guid = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO reviews (guid, movie_id, user_id, title, text)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(movie_id.to_string())
    .bind(user_id.to_string())
    .bind(title)
    .bind(text)
    .execute(pool)
    .await?;

    Ok(Review {
        guid,
        movie_id,
        user_id,
        title: title.to_string(),
        text: text.to_string(),
        rate: 0,
    })
}

pub async fn get_review(pool: &SqlitePool, review_id: Uuid) -> CatalogResult<Option<Review>> {
    let row = sqlx::query(
        "SELECT guid, movie_id, user_id, title, text, rate FROM reviews WHERE guid = ?",
    )
    .bind(review_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(review_from_row).transpose()
}

pub async fn reviews_for_movie(pool: &SqlitePool, movie_id: Uuid) -> CatalogResult<Vec<Review>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, movie_id, user_id, title, text, rate
        FROM reviews
        WHERE movie_id = ?
        ORDER BY created_at, guid
        "#,
    )
    .bind(movie_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(review_from_row).collect()
}

pub async fn reviews_for_user(pool: &SqlitePool, user_id: Uuid) -> CatalogResult<Vec<Review>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, movie_id, user_id, title, text, rate
        FROM reviews
        WHERE user_id = ?
        ORDER BY created_at, guid
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(review_from_row).collect()
}

/// Update title and/or text; `None` leaves a field unchanged
pub async fn update_review(
    pool: &SqlitePool,
    review_id: Uuid,
    title: Option<&str>,
    text: Option<&str>,
) -> CatalogResult<Review> {
    if matches!(text, Some(t) if t.trim().is_empty()) {
        return Err(CatalogError::InvalidInput("Review text must not be empty".to_string()));
    }

    let result = sqlx::query(
        r#"
        UPDATE reviews
        SET title = COALESCE(?, title),
            text = COALESCE(?, text),
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(title)
    .bind(text)
    .bind(review_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found("Review", review_id));
    }

    get_review(pool, review_id)
        .await?
        .ok_or_else(|| CatalogError::not_found("Review", review_id))
}

/// Apply one rate step in a single statement and return the new rate
pub async fn change_rate(pool: &SqlitePool, review_id: Uuid, change: RateChange) -> CatalogResult<i64> {
    let rate: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE reviews
        SET rate = rate + ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        RETURNING rate
        "#,
    )
    .bind(change.delta())
    .bind(review_id.to_string())
    .fetch_optional(pool)
    .await?;

    rate.ok_or_else(|| CatalogError::not_found("Review", review_id))
}

pub async fn remove_review(pool: &SqlitePool, review_id: Uuid) -> CatalogResult<bool> {
    let result = sqlx::query("DELETE FROM reviews WHERE guid = ?")
        .bind(review_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every review written by a user; returns the number removed
pub async fn remove_reviews_for_user(pool: &SqlitePool, user_id: Uuid) -> CatalogResult<u64> {
    let result = sqlx::query("DELETE FROM reviews WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
