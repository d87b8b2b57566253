//! Natural-key index
//!
//! Maps each resolvable entity type to its table and natural-key column and
//! looks up internal ids by natural key. The UNIQUE constraint on the key
//! column is what makes the lookup authoritative.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use uuid::Uuid;

use super::parse_guid;
use crate::error::{CatalogError, CatalogResult};

/// Resolvable entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    Person,
    Genre,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Movie => "movies",
            EntityKind::Person => "people",
            EntityKind::Genre => "genres",
        }
    }

    /// Column holding the natural key (UNIQUE)
    pub fn key_column(self) -> &'static str {
        match self {
            EntityKind::Movie | EntityKind::Person => "external_id",
            EntityKind::Genre => "name_key",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Person => "person",
            EntityKind::Genre => "genre",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalize a raw natural key for storage and lookup
///
/// External ids are trimmed. Genre names are trimmed, inner whitespace is
/// collapsed and the result lower-cased, so "Sci  Fi" and "sci fi" share a row.
pub fn normalize_key(kind: EntityKind, raw: &str) -> CatalogResult<String> {
    let key = match kind {
        EntityKind::Movie | EntityKind::Person => raw.trim().to_string(),
        EntityKind::Genre => raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    };

    if key.is_empty() {
        return Err(CatalogError::InvalidInput(format!(
            "{} natural key must not be empty",
            kind
        )));
    }

    Ok(key)
}

/// Look up the internal id for an already-normalized natural key
pub async fn lookup(pool: &SqlitePool, kind: EntityKind, key: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let sql = format!(
        "SELECT guid FROM {} WHERE {} = ?",
        kind.table(),
        kind.key_column()
    );

    let guid: Option<String> = sqlx::query_scalar(&sql)
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match guid {
        // A corrupt guid is a storage fault, surfaced like any other decode error
        Some(raw) => parse_guid(&raw)
            .map(Some)
            .map_err(|e| sqlx::Error::Decode(Box::new(e))),
        None => Ok(None),
    }
}
