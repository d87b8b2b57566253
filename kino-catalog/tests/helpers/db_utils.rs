//! Database Test Utilities

#![allow(dead_code)]

use anyhow::Result;
use kino_catalog::db::settings::CatalogSettings;
use kino_catalog::AppState;
use kino_common::events::EventBus;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Create temporary test database through the production init path
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_kino.db");
    let pool = kino_common::db::init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// App state over a fresh database with the local image store
pub async fn create_test_state() -> Result<(TempDir, AppState)> {
    let (temp_dir, pool) = create_test_db().await?;
    let state = AppState::with_local_images(pool, EventBus::new(100), CatalogSettings::default());
    Ok((temp_dir, state))
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(sqlx::query_scalar(&sql).fetch_one(pool).await?)
}

/// Display names of a movie's genres, sorted
pub async fn movie_genre_names(pool: &SqlitePool, movie_id: Uuid) -> Result<Vec<String>> {
    let genres = kino_catalog::db::movies::movie_genres(pool, movie_id).await?;
    let mut names: Vec<String> = genres.into_iter().filter_map(|g| g.name).collect();
    names.sort();
    Ok(names)
}
