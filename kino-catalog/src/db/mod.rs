//! Database access for kino-catalog
//!
//! Row types and queries per table. Functions that must run inside a
//! caller's transaction take `&mut SqliteConnection`; plain reads take the pool.

pub mod genres;
pub mod images;
pub mod movies;
pub mod natural_keys;
pub mod people;
pub mod reviews;
pub mod roles;
pub mod settings;
pub mod users;

use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};

/// Parse a TEXT guid column
pub(crate) fn parse_guid(raw: &str) -> CatalogResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        CatalogError::Common(kino_common::Error::Internal(format!(
            "Invalid guid '{}' in database: {}",
            raw, e
        )))
    })
}
