//! Database initialization
//!
//! Creates the catalog schema on first run and ensures default settings.
//! Every statement is idempotent so startup can run against an existing file.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Busy timeout used until the `database_lock_retry_ms` setting is readable
pub const DEFAULT_LOCK_RETRY_MS: u64 = 250;

/// Role value assigned to every user at creation time
pub const DEFAULT_USER_ROLE: &str = "USER";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = open_pool(db_path, DEFAULT_LOCK_RETRY_MS).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;
    init_default_settings(&pool).await?;

    // busy_timeout is per connection, so a changed setting needs a fresh pool
    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_lock_retry_ms'",
    )
    .fetch_optional(&pool)
    .await?
    .unwrap_or(DEFAULT_LOCK_RETRY_MS as i64);

    let timeout_ms = timeout_ms.max(0) as u64;
    if timeout_ms != DEFAULT_LOCK_RETRY_MS {
        pool.close().await;
        let pool = open_pool(db_path, timeout_ms).await?;
        info!("Database busy timeout set to {} ms", timeout_ms);
        return Ok(pool);
    }

    info!("Database busy timeout set to {} ms", timeout_ms);
    Ok(pool)
}

/// Open a connection pool with foreign keys, WAL and the given busy timeout
async fn open_pool(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create every catalog table (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;

    // Resolvable entities
    create_movies_table(pool).await?;
    create_people_table(pool).await?;
    create_genres_table(pool).await?;

    // Identity context
    create_users_table(pool).await?;
    create_roles_table(pool).await?;

    // Association tables
    create_movie_people_table(pool).await?;
    create_movie_genres_table(pool).await?;
    create_user_roles_table(pool).await?;

    // Collaborator-owned tables
    create_images_table(pool).await?;
    create_reviews_table(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime tunables as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_movies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movies (
            guid TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            title TEXT,
            release_year INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS people (
            guid TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the genres table
///
/// `name_key` is the normalized name used for deduplication; `name` keeps
/// the most recently ingested spelling.
pub async fn create_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            guid TEXT PRIMARY KEY,
            name_key TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            phone_number TEXT,
            is_activated INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the roles table and seed the built-in roles
pub async fn create_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            guid TEXT PRIMARY KEY,
            value TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let defaults = [
        ("00000000-0000-0000-0000-000000000001", DEFAULT_USER_ROLE, "Regular user"),
        ("00000000-0000-0000-0000-000000000002", "ADMIN", "Administrator"),
    ];

    for (guid, value, description) in defaults {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO roles (guid, value, description)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(guid)
        .bind(value)
        .bind(description)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Create the movie_people junction table
///
/// One person may hold several roles in the same movie, so the role label
/// is part of the uniqueness key.
pub async fn create_movie_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movie_people (
            movie_id TEXT NOT NULL REFERENCES movies(guid) ON DELETE CASCADE,
            person_id TEXT NOT NULL REFERENCES people(guid) ON DELETE CASCADE,
            role TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (movie_id, person_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_movie_people_person ON movie_people(person_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_movie_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movie_genres (
            movie_id TEXT NOT NULL REFERENCES movies(guid) ON DELETE CASCADE,
            genre_id TEXT NOT NULL REFERENCES genres(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (movie_id, genre_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_movie_genres_genre ON movie_genres(genre_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_user_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            role_id TEXT NOT NULL REFERENCES roles(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, role_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the images table (local Images collaborator store)
pub async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            guid TEXT PRIMARY KEY,
            movie_id TEXT NOT NULL REFERENCES movies(guid) ON DELETE CASCADE,
            url TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'poster',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (movie_id, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_movie ON images(movie_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the reviews table
///
/// Reviews belong to the comments context; movie and user ids refer to rows
/// owned by other services and are not foreign keys.
pub async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            guid TEXT PRIMARY KEY,
            movie_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            text TEXT NOT NULL,
            rate INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_movie ON reviews(movie_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// This function ensures all required settings exist with default values.
/// It also handles NULL values by resetting them to defaults.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "database_max_lock_wait_ms", "5000").await?;
    ensure_setting(pool, "database_lock_retry_ms", "250").await?;
    ensure_setting(pool, "composition_collaborator_timeout_ms", "2000").await?;
    ensure_setting(pool, "event_bus_capacity", "100").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE: concurrent initializers may race past the same key
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
