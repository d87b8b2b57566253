//! Association ledger
//!
//! Typed many-to-many links between entities: movie↔person (with a role),
//! movie↔genre and user↔role. Every add or remove verifies both sides exist
//! and applies the protected-value guard inside the same transaction as the
//! mutation. Adding a present link and removing an absent one are no-ops.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::db::parse_guid;
use crate::error::{CatalogError, CatalogResult};
use crate::services::reconciler::{reconcile_in, ReconcileDiff};
use crate::utils::{begin_monitored, retry_on_lock};

/// Association types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    MoviePeople,
    MovieGenres,
    UserRoles,
}

/// Table layout of one association type
struct Layout {
    table: &'static str,
    left_column: &'static str,
    right_column: &'static str,
    attribute_column: Option<&'static str>,
    left_table: &'static str,
    left_label: &'static str,
    right_table: &'static str,
    right_label: &'static str,
    /// Right-side column checked against `protected`
    guarded_column: Option<&'static str>,
    protected: &'static [&'static str],
}

const MOVIE_PEOPLE: Layout = Layout {
    table: "movie_people",
    left_column: "movie_id",
    right_column: "person_id",
    attribute_column: Some("role"),
    left_table: "movies",
    left_label: "Movie",
    right_table: "people",
    right_label: "Person",
    guarded_column: None,
    protected: &[],
};

const MOVIE_GENRES: Layout = Layout {
    table: "movie_genres",
    left_column: "movie_id",
    right_column: "genre_id",
    attribute_column: None,
    left_table: "movies",
    left_label: "Movie",
    right_table: "genres",
    right_label: "Genre",
    guarded_column: None,
    protected: &[],
};

const USER_ROLES: Layout = Layout {
    table: "user_roles",
    left_column: "user_id",
    right_column: "role_id",
    attribute_column: None,
    left_table: "users",
    left_label: "User",
    right_table: "roles",
    right_label: "Role",
    guarded_column: Some("value"),
    protected: &[kino_common::db::DEFAULT_USER_ROLE],
};

impl AssociationKind {
    fn layout(self) -> &'static Layout {
        match self {
            AssociationKind::MoviePeople => &MOVIE_PEOPLE,
            AssociationKind::MovieGenres => &MOVIE_GENRES,
            AssociationKind::UserRoles => &USER_ROLES,
        }
    }

    /// True if `value` may not be added or removed through the ledger
    pub fn is_protected(self, value: &str) -> bool {
        self.layout().protected.contains(&value.trim())
    }

    /// Label of the left-side entity ("Movie", "User")
    pub fn left_label(self) -> &'static str {
        self.layout().left_label
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layout().table)
    }
}

/// Right side of a link, as seen from its left entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub right: Uuid,
    /// Role label for movie↔person links; `None` for the other kinds
    pub attribute: Option<String>,
}

impl Link {
    pub fn new(right: Uuid) -> Self {
        Self {
            right,
            attribute: None,
        }
    }

    pub fn with_attribute(right: Uuid, attribute: impl Into<String>) -> Self {
        Self {
            right,
            attribute: Some(attribute.into()),
        }
    }
}

/// Stored link as reported by `add`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationRef {
    pub kind: AssociationKind,
    pub left: Uuid,
    pub right: Uuid,
    pub attribute: Option<String>,
    /// False when the link was already present
    pub created: bool,
}

/// Link mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkOp {
    Add,
    Remove,
}

/// Whether the protected-value guard applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Guard {
    Enforced,
    /// Entity-creation path; the only writer of protected values
    CreationTime,
}

/// Validate and canonicalize a link for `kind`
///
/// Role labels are trimmed and lower-cased so "Actor" and "actor" are one link.
pub(crate) fn normalize_link(kind: AssociationKind, link: &Link) -> CatalogResult<Link> {
    let layout = kind.layout();
    let attribute = match (layout.attribute_column, &link.attribute) {
        (Some(column), Some(raw)) => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "{} {} must not be empty",
                    kind, column
                )));
            }
            Some(value)
        }
        (Some(column), None) => {
            return Err(CatalogError::InvalidInput(format!(
                "{} links require a {}",
                kind, column
            )))
        }
        (None, Some(_)) => {
            return Err(CatalogError::InvalidInput(format!(
                "{} links carry no attribute",
                kind
            )))
        }
        (None, None) => None,
    };

    Ok(Link {
        right: link.right,
        attribute,
    })
}

async fn ensure_left(conn: &mut SqliteConnection, layout: &Layout, left: Uuid) -> CatalogResult<()> {
    let sql = format!("SELECT 1 FROM {} WHERE guid = ?", layout.left_table);
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(left.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(CatalogError::not_found(layout.left_label, left)),
    }
}

/// Verify the right side exists and apply the protected-value guard
async fn check_right(
    conn: &mut SqliteConnection,
    layout: &Layout,
    link: &Link,
    guard: Guard,
) -> CatalogResult<()> {
    let column = layout.guarded_column.unwrap_or("guid");
    let sql = format!("SELECT {} FROM {} WHERE guid = ?", column, layout.right_table);
    let value: Option<String> = sqlx::query_scalar(&sql)
        .bind(link.right.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let value = value.ok_or_else(|| CatalogError::not_found(layout.right_label, link.right))?;

    if guard == Guard::Enforced {
        let guarded = match layout.guarded_column {
            Some(_) => Some(value.as_str()),
            None => link.attribute.as_deref(),
        };
        if let Some(guarded) = guarded {
            if layout.protected.contains(&guarded) {
                return Err(CatalogError::ProtectedValue(guarded.to_string()));
            }
        }
    }

    Ok(())
}

/// Add a link inside the caller's transaction
pub(crate) async fn add_in(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    left: Uuid,
    link: &Link,
    guard: Guard,
) -> CatalogResult<AssociationRef> {
    let layout = kind.layout();
    let link = normalize_link(kind, link)?;

    ensure_left(conn, layout, left).await?;
    check_right(conn, layout, &link, guard).await?;

    let result = match layout.attribute_column {
        Some(attribute_column) => {
            let sql = format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
                layout.table, layout.left_column, layout.right_column, attribute_column
            );
            sqlx::query(&sql)
                .bind(left.to_string())
                .bind(link.right.to_string())
                .bind(link.attribute.as_deref())
                .execute(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "INSERT INTO {} ({}, {}) VALUES (?, ?) ON CONFLICT DO NOTHING",
                layout.table, layout.left_column, layout.right_column
            );
            sqlx::query(&sql)
                .bind(left.to_string())
                .bind(link.right.to_string())
                .execute(&mut *conn)
                .await?
        }
    };

    let created = result.rows_affected() > 0;
    debug!(kind = %kind, left = %left, right = %link.right, created, "Link added");

    Ok(AssociationRef {
        kind,
        left,
        right: link.right,
        attribute: link.attribute,
        created,
    })
}

/// Remove a link inside the caller's transaction; returns whether a row was deleted
pub(crate) async fn remove_in(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    left: Uuid,
    link: &Link,
    guard: Guard,
) -> CatalogResult<bool> {
    let layout = kind.layout();
    let link = normalize_link(kind, link)?;

    ensure_left(conn, layout, left).await?;
    check_right(conn, layout, &link, guard).await?;

    let result = match layout.attribute_column {
        Some(attribute_column) => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ? AND {} = ? AND {} = ?",
                layout.table, layout.left_column, layout.right_column, attribute_column
            );
            sqlx::query(&sql)
                .bind(left.to_string())
                .bind(link.right.to_string())
                .bind(link.attribute.as_deref())
                .execute(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ? AND {} = ?",
                layout.table, layout.left_column, layout.right_column
            );
            sqlx::query(&sql)
                .bind(left.to_string())
                .bind(link.right.to_string())
                .execute(&mut *conn)
                .await?
        }
    };

    let removed = result.rows_affected() > 0;
    debug!(kind = %kind, left = %left, right = %link.right, removed, "Link removed");

    Ok(removed)
}

/// All links stored for `left`
pub(crate) async fn current_links_in(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    left: Uuid,
) -> CatalogResult<BTreeSet<Link>> {
    let layout = kind.layout();
    let attribute_select = layout.attribute_column.unwrap_or("NULL");
    let sql = format!(
        "SELECT {} AS right_id, {} AS attribute FROM {} WHERE {} = ?",
        layout.right_column, attribute_select, layout.table, layout.left_column
    );

    let rows = sqlx::query(&sql)
        .bind(left.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| {
            let right: String = row.get("right_id");
            Ok(Link {
                right: parse_guid(&right)?,
                attribute: row.get("attribute"),
            })
        })
        .collect()
}

pub(crate) async fn ensure_left_in(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    left: Uuid,
) -> CatalogResult<()> {
    ensure_left(conn, kind.layout(), left).await
}

/// Transactional entry point for link mutations
#[derive(Clone)]
pub struct AssociationLedger {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl AssociationLedger {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    /// Add a link (idempotent)
    pub async fn add(
        &self,
        kind: AssociationKind,
        left: Uuid,
        link: &Link,
    ) -> CatalogResult<AssociationRef> {
        let pool = &self.pool;
        retry_on_lock("association_ledger::add", self.max_lock_wait_ms, || async {
            let mut tx = begin_monitored(pool, "association_ledger::add").await?;
            let reference = add_in(tx.conn(), kind, left, link, Guard::Enforced).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(reference)
        })
        .await
    }

    /// Remove a link; returns false if it was absent
    pub async fn remove(&self, kind: AssociationKind, left: Uuid, link: &Link) -> CatalogResult<bool> {
        let pool = &self.pool;
        retry_on_lock("association_ledger::remove", self.max_lock_wait_ms, || async {
            let mut tx = begin_monitored(pool, "association_ledger::remove").await?;
            let removed = remove_in(tx.conn(), kind, left, link, Guard::Enforced).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(removed)
        })
        .await
    }

    /// Apply one link operation; returns whether stored state changed
    pub async fn apply(
        &self,
        kind: AssociationKind,
        left: Uuid,
        link: &Link,
        op: LinkOp,
    ) -> CatalogResult<bool> {
        match op {
            LinkOp::Add => Ok(self.add(kind, left, link).await?.created),
            LinkOp::Remove => self.remove(kind, left, link).await,
        }
    }

    /// Current link set of `left`
    pub async fn links(&self, kind: AssociationKind, left: Uuid) -> CatalogResult<BTreeSet<Link>> {
        let mut conn = self.pool.acquire().await?;
        current_links_in(&mut conn, kind, left).await
    }

    /// Replace the link set of `left` with `target` in one transaction
    pub async fn replace_set(
        &self,
        kind: AssociationKind,
        left: Uuid,
        target: &[Link],
    ) -> CatalogResult<ReconcileDiff> {
        let pool = &self.pool;
        retry_on_lock("association_ledger::replace_set", self.max_lock_wait_ms, || async {
            let mut tx = begin_monitored(pool, "association_ledger::replace_set").await?;
            let diff = reconcile_in(tx.conn(), kind, left, target).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(diff)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_resolver::EntityResolver;
    use crate::test_support::test_pool;

    async fn movie_and_person(pool: &SqlitePool) -> (Uuid, Uuid) {
        let resolver = EntityResolver::new(pool.clone(), 5000);
        let movie = resolver.resolve_movie("tt1", Some("A"), None).await.unwrap();
        let person = resolver.resolve_person("p1", Some("Alice")).await.unwrap();
        (movie.id, person.id)
    }

    #[tokio::test]
    async fn test_add_twice_keeps_one_row() {
        let (_dir, pool) = test_pool().await;
        let (movie, person) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool.clone(), 5000);
        let link = Link::with_attribute(person, "actor");

        let first = ledger.add(AssociationKind::MoviePeople, movie, &link).await.unwrap();
        let second = ledger.add(AssociationKind::MoviePeople, movie, &link).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        let links = ledger.links(AssociationKind::MoviePeople, movie).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_same_person_two_roles() {
        let (_dir, pool) = test_pool().await;
        let (movie, person) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool, 5000);

        ledger
            .add(AssociationKind::MoviePeople, movie, &Link::with_attribute(person, "Actor"))
            .await
            .unwrap();
        ledger
            .add(AssociationKind::MoviePeople, movie, &Link::with_attribute(person, "director"))
            .await
            .unwrap();

        let links = ledger.links(AssociationKind::MoviePeople, movie).await.unwrap();
        let roles: Vec<_> = links.iter().filter_map(|l| l.attribute.clone()).collect();
        assert_eq!(roles, vec!["actor".to_string(), "director".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_reports_absence() {
        let (_dir, pool) = test_pool().await;
        let (movie, person) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool, 5000);
        let link = Link::with_attribute(person, "actor");

        assert!(!ledger.remove(AssociationKind::MoviePeople, movie, &link).await.unwrap());
        ledger.add(AssociationKind::MoviePeople, movie, &link).await.unwrap();
        assert!(ledger.remove(AssociationKind::MoviePeople, movie, &link).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_right_names_the_side() {
        let (_dir, pool) = test_pool().await;
        let (movie, _) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool, 5000);

        let err = ledger
            .add(AssociationKind::MovieGenres, movie, &Link::new(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { entity: "Genre", .. }));
        assert!(ledger.links(AssociationKind::MovieGenres, movie).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_left_names_the_side() {
        let (_dir, pool) = test_pool().await;
        let (_, person) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool, 5000);

        let err = ledger
            .add(
                AssociationKind::MoviePeople,
                Uuid::new_v4(),
                &Link::with_attribute(person, "actor"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { entity: "Movie", .. }));
    }

    #[tokio::test]
    async fn test_attribute_shape_validated() {
        let (_dir, pool) = test_pool().await;
        let (movie, person) = movie_and_person(&pool).await;
        let ledger = AssociationLedger::new(pool, 5000);

        let missing = ledger
            .add(AssociationKind::MoviePeople, movie, &Link::new(person))
            .await;
        assert!(matches!(missing, Err(CatalogError::InvalidInput(_))));

        let blank = ledger
            .add(AssociationKind::MoviePeople, movie, &Link::with_attribute(person, "  "))
            .await;
        assert!(matches!(blank, Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_only_user_role_is_protected() {
        assert!(AssociationKind::UserRoles.is_protected("USER"));
        assert!(!AssociationKind::UserRoles.is_protected("ADMIN"));
        assert!(!AssociationKind::MoviePeople.is_protected("USER"));
    }
}
