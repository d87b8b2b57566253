//! Settings database operations
//!
//! Provides get/set accessors for the settings table following the
//! key-value pattern, plus the typed bundle the services are built from.

use sqlx::SqlitePool;
use std::time::Duration;

use kino_common::{Error, Result};

/// Runtime tunables read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSettings {
    /// Upper bound for lock retries on one operation
    pub max_lock_wait_ms: u64,
    /// Time budget for each collaborator call during composition
    pub collaborator_timeout_ms: u64,
    pub event_bus_capacity: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            max_lock_wait_ms: 5000,
            collaborator_timeout_ms: 2000,
            event_bus_capacity: 100,
        }
    }
}

impl CatalogSettings {
    /// Load settings, falling back to defaults for missing keys
    pub async fn load(db: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            max_lock_wait_ms: get_setting(db, "database_max_lock_wait_ms")
                .await?
                .unwrap_or(defaults.max_lock_wait_ms),
            collaborator_timeout_ms: get_setting(db, "composition_collaborator_timeout_ms")
                .await?
                .unwrap_or(defaults.collaborator_timeout_ms),
            event_bus_capacity: get_setting(db, "event_bus_capacity")
                .await?
                .unwrap_or(defaults.event_bus_capacity),
        })
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

/// Generic setting getter
///
/// **Returns:** Some(value) if set, None if the key is missing or NULL
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (UPSERT)
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_loaded_from_fresh_database() {
        let (_dir, pool) = crate::test_support::test_pool().await;

        let settings = CatalogSettings::load(&pool).await.unwrap();
        assert_eq!(settings, CatalogSettings::default());
    }

    #[tokio::test]
    async fn test_set_setting_update() {
        let (_dir, pool) = crate::test_support::test_pool().await;

        set_setting(&pool, "composition_collaborator_timeout_ms", 150).await.unwrap();
        set_setting(&pool, "composition_collaborator_timeout_ms", 300).await.unwrap();

        let settings = CatalogSettings::load(&pool).await.unwrap();
        assert_eq!(settings.collaborator_timeout_ms, 300);
        assert_eq!(settings.collaborator_timeout(), Duration::from_millis(300));

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settings WHERE key = 'composition_collaborator_timeout_ms'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let (_dir, pool) = crate::test_support::test_pool().await;

        set_setting(&pool, "event_bus_capacity", "lots").await.unwrap();

        let result = CatalogSettings::load(&pool).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_key_returns_none() {
        let (_dir, pool) = crate::test_support::test_pool().await;

        let value: Option<u64> = get_setting(&pool, "no_such_key").await.unwrap();
        assert!(value.is_none());
    }
}
