//! Entity resolver
//!
//! Find-or-create for movies, people and genres keyed by natural key.
//! The UNIQUE constraint on the natural-key column arbitrates concurrent
//! creates: the loser of an insert race re-reads the winning row and returns
//! it as an existing entity. Attribute updates are last-write-wins per field.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::natural_keys::{lookup, normalize_key, EntityKind};
use crate::error::{CatalogError, CatalogResult};
use crate::utils::retry_on_lock;

/// Mutable attributes supplied with a resolution
///
/// `None` leaves the stored value unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityAttributes {
    Movie {
        title: Option<String>,
        release_year: Option<i64>,
    },
    Person {
        name: Option<String>,
    },
    Genre {
        name: Option<String>,
    },
}

enum AttrValue<'a> {
    Text(&'a str),
    Int(i64),
}

impl EntityAttributes {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityAttributes::Movie { .. } => EntityKind::Movie,
            EntityAttributes::Person { .. } => EntityKind::Person,
            EntityAttributes::Genre { .. } => EntityKind::Genre,
        }
    }

    /// Provided fields as (column, value) pairs
    fn columns(&self) -> Vec<(&'static str, AttrValue<'_>)> {
        let mut columns = Vec::new();
        match self {
            EntityAttributes::Movie {
                title,
                release_year,
            } => {
                if let Some(title) = title {
                    columns.push(("title", AttrValue::Text(title)));
                }
                if let Some(year) = release_year {
                    columns.push(("release_year", AttrValue::Int(*year)));
                }
            }
            EntityAttributes::Person { name } | EntityAttributes::Genre { name } => {
                if let Some(name) = name {
                    columns.push(("name", AttrValue::Text(name)));
                }
            }
        }
        columns
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub id: Uuid,
    /// True only for the call whose insert created the row
    pub created: bool,
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &AttrValue<'q>) -> SqliteQuery<'q> {
    match value {
        AttrValue::Text(text) => query.bind(*text),
        AttrValue::Int(int) => query.bind(*int),
    }
}

/// Find-or-create service for resolvable entities
#[derive(Clone)]
pub struct EntityResolver {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl EntityResolver {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    /// Resolve a natural key to an internal id, creating the row if absent
    ///
    /// Concurrent calls for the same unseen key all return the same id and
    /// exactly one of them reports `created = true`.
    pub async fn resolve(
        &self,
        kind: EntityKind,
        natural_key: &str,
        attributes: &EntityAttributes,
    ) -> CatalogResult<Resolution> {
        if attributes.kind() != kind {
            return Err(CatalogError::InvalidInput(format!(
                "{} attributes supplied for a {} resolution",
                attributes.kind(),
                kind
            )));
        }

        let key = normalize_key(kind, natural_key)?;
        let key_ref = &key;

        retry_on_lock("entity_resolver::resolve", self.max_lock_wait_ms, || async {
            self.resolve_once(kind, key_ref, attributes).await
        })
        .await
        .map_err(|source| CatalogError::Resolution {
            kind,
            key: key.clone(),
            source,
        })
    }

    pub async fn resolve_movie(
        &self,
        external_id: &str,
        title: Option<&str>,
        release_year: Option<i64>,
    ) -> CatalogResult<Resolution> {
        let attributes = EntityAttributes::Movie {
            title: title.map(str::to_string),
            release_year,
        };
        self.resolve(EntityKind::Movie, external_id, &attributes).await
    }

    pub async fn resolve_person(
        &self,
        external_id: &str,
        name: Option<&str>,
    ) -> CatalogResult<Resolution> {
        let attributes = EntityAttributes::Person {
            name: name.map(str::to_string),
        };
        self.resolve(EntityKind::Person, external_id, &attributes).await
    }

    /// Resolve a genre by name; the spelling given becomes the display name
    pub async fn resolve_genre(&self, name: &str) -> CatalogResult<Resolution> {
        let attributes = EntityAttributes::Genre {
            name: Some(name.split_whitespace().collect::<Vec<_>>().join(" ")),
        };
        self.resolve(EntityKind::Genre, name, &attributes).await
    }

    async fn resolve_once(
        &self,
        kind: EntityKind,
        key: &str,
        attributes: &EntityAttributes,
    ) -> Result<Resolution, sqlx::Error> {
        if let Some(id) = lookup(&self.pool, kind, key).await? {
            self.update_attributes(kind, id, attributes).await?;
            return Ok(Resolution { id, created: false });
        }

        let id = Uuid::new_v4();
        match self.insert(kind, id, key, attributes).await {
            Ok(()) => {
                debug!(kind = %kind, key, id = %id, "Created entity");
                Ok(Resolution { id, created: true })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost a create race: the winner's row is authoritative
                let winner = lookup(&self.pool, kind, key)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                debug!(kind = %kind, key, id = %winner, "Recovered concurrent create");
                self.update_attributes(kind, winner, attributes).await?;
                Ok(Resolution {
                    id: winner,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(
        &self,
        kind: EntityKind,
        id: Uuid,
        key: &str,
        attributes: &EntityAttributes,
    ) -> Result<(), sqlx::Error> {
        let columns = attributes.columns();

        let mut names = vec!["guid", kind.key_column()];
        names.extend(columns.iter().map(|(name, _)| *name));
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table(),
            names.join(", "),
            placeholders
        );

        let id_str = id.to_string();
        let mut query = sqlx::query(&sql).bind(id_str.as_str()).bind(key);
        for (_, value) in &columns {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    /// Overwrite provided fields; rows whose values already match are untouched
    async fn update_attributes(
        &self,
        kind: EntityKind,
        id: Uuid,
        attributes: &EntityAttributes,
    ) -> Result<(), sqlx::Error> {
        let columns = attributes.columns();
        if columns.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = columns
            .iter()
            .map(|(name, _)| format!("{} = ?", name))
            .collect();
        let changed: Vec<String> = columns
            .iter()
            .map(|(name, _)| format!("{} IS NOT ?", name))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, updated_at = CURRENT_TIMESTAMP WHERE guid = ? AND ({})",
            kind.table(),
            assignments.join(", "),
            changed.join(" OR ")
        );

        let id_str = id.to_string();
        let mut query = sqlx::query(&sql);
        for (_, value) in &columns {
            query = bind_value(query, value);
        }
        query = query.bind(id_str.as_str());
        for (_, value) in &columns {
            query = bind_value(query, value);
        }

        let updated = query.execute(&self.pool).await?.rows_affected();
        if updated > 0 {
            debug!(kind = %kind, id = %id, "Updated entity attributes");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::movies::load_movie;
    use crate::db::people::count_people;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn test_resolve_creates_then_finds() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);

        let first = resolver.resolve_person("p1", Some("Alice")).await.unwrap();
        let second = resolver.resolve_person("p1", Some("Alice")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(count_people(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_is_last_write_wins_per_field() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);

        let movie = resolver
            .resolve_movie("tt1", Some("Draft"), Some(1999))
            .await
            .unwrap();
        resolver.resolve_movie("tt1", Some("Final"), None).await.unwrap();

        let stored = load_movie(&pool, movie.id).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Final"));
        // omitted field keeps its stored value
        assert_eq!(stored.release_year, Some(1999));
    }

    #[tokio::test]
    async fn test_genre_spellings_share_one_row() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool, 5000);

        let a = resolver.resolve_genre("Science Fiction").await.unwrap();
        let b = resolver.resolve_genre("  science   fiction").await.unwrap();

        assert!(a.created);
        assert!(!b.created);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_mismatched_attributes_rejected() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool, 5000);

        let attrs = EntityAttributes::Person { name: None };
        let result = resolver.resolve(EntityKind::Movie, "tt1", &attrs).await;
        assert!(matches!(result, Err(CatalogError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_storage_fault_is_resolution_error() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 50);
        pool.close().await;

        let result = resolver.resolve_person("p1", None).await;
        match result {
            Err(CatalogError::Resolution { kind, key, .. }) => {
                assert_eq!(kind, EntityKind::Person);
                assert_eq!(key, "p1");
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }
}
