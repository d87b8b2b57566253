//! Association reconciler
//!
//! Replaces the stored link set of one left entity with a target set.
//! Removals are applied before additions, all through the ledger's add and
//! remove paths so guards and idempotence carry over.

use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

use crate::error::CatalogResult;
use crate::services::association_ledger::{
    add_in, current_links_in, ensure_left_in, normalize_link, remove_in, AssociationKind,
    AssociationLedger, Guard, Link,
};

/// Changes made by one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileDiff {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileDiff {
    /// True if stored state changed
    pub fn is_churn(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Reconcile inside the caller's transaction
///
/// Duplicate entries in `target` collapse to one link.
pub(crate) async fn reconcile_in(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    left: Uuid,
    target: &[Link],
) -> CatalogResult<ReconcileDiff> {
    ensure_left_in(conn, kind, left).await?;

    let target: BTreeSet<Link> = target
        .iter()
        .map(|link| normalize_link(kind, link))
        .collect::<CatalogResult<_>>()?;
    let current = current_links_in(conn, kind, left).await?;

    let mut diff = ReconcileDiff {
        unchanged: current.intersection(&target).count(),
        ..ReconcileDiff::default()
    };

    for link in current.difference(&target) {
        if remove_in(conn, kind, left, link, Guard::Enforced).await? {
            diff.removed += 1;
        }
    }

    for link in target.difference(&current) {
        if add_in(conn, kind, left, link, Guard::Enforced).await?.created {
            diff.added += 1;
        }
    }

    debug!(
        kind = %kind,
        left = %left,
        added = diff.added,
        removed = diff.removed,
        unchanged = diff.unchanged,
        "Reconciled links"
    );

    Ok(diff)
}

/// Full-replace reconciliation of association sets
#[derive(Clone)]
pub struct Reconciler {
    ledger: AssociationLedger,
}

impl Reconciler {
    pub fn new(ledger: AssociationLedger) -> Self {
        Self { ledger }
    }

    /// Make the stored links of `left` equal `target`, in one transaction
    pub async fn reconcile(
        &self,
        kind: AssociationKind,
        left: Uuid,
        target: &[Link],
    ) -> CatalogResult<ReconcileDiff> {
        self.ledger.replace_set(kind, left, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::services::entity_resolver::EntityResolver;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn test_second_target_replaces_first() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);
        let reconciler = Reconciler::new(AssociationLedger::new(pool.clone(), 5000));

        let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
        let drama = resolver.resolve_genre("Drama").await.unwrap().id;
        let comedy = resolver.resolve_genre("Comedy").await.unwrap().id;
        let horror = resolver.resolve_genre("Horror").await.unwrap().id;

        let first = [Link::new(drama), Link::new(comedy)];
        let second = [Link::new(comedy), Link::new(horror)];

        reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &first)
            .await
            .unwrap();
        let diff = reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &second)
            .await
            .unwrap();

        assert_eq!(diff, ReconcileDiff { added: 1, removed: 1, unchanged: 1 });

        let ledger = AssociationLedger::new(pool, 5000);
        let stored = ledger.links(AssociationKind::MovieGenres, movie).await.unwrap();
        let expected: BTreeSet<Link> = second.into_iter().collect();
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_duplicates_collapse_and_repeat_is_quiet() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);
        let reconciler = Reconciler::new(AssociationLedger::new(pool, 5000));

        let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
        let person = resolver.resolve_person("p1", None).await.unwrap().id;
        let target = [
            Link::with_attribute(person, "actor"),
            Link::with_attribute(person, " Actor "),
        ];

        let first = reconciler
            .reconcile(AssociationKind::MoviePeople, movie, &target)
            .await
            .unwrap();
        let second = reconciler
            .reconcile(AssociationKind::MoviePeople, movie, &target)
            .await
            .unwrap();

        assert_eq!(first.added, 1);
        assert!(!second.is_churn());
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn test_empty_target_clears_links() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);
        let reconciler = Reconciler::new(AssociationLedger::new(pool, 5000));

        let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
        let drama = resolver.resolve_genre("Drama").await.unwrap().id;

        reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &[Link::new(drama)])
            .await
            .unwrap();
        let diff = reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &[])
            .await
            .unwrap();

        assert_eq!(diff.removed, 1);
    }

    #[tokio::test]
    async fn test_missing_target_entity_rolls_back() {
        let (_dir, pool) = test_pool().await;
        let resolver = EntityResolver::new(pool.clone(), 5000);
        let ledger = AssociationLedger::new(pool, 5000);
        let reconciler = Reconciler::new(ledger.clone());

        let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
        let drama = resolver.resolve_genre("Drama").await.unwrap().id;
        reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &[Link::new(drama)])
            .await
            .unwrap();

        let result = reconciler
            .reconcile(AssociationKind::MovieGenres, movie, &[Link::new(Uuid::new_v4())])
            .await;
        assert!(matches!(result, Err(CatalogError::NotFound { entity: "Genre", .. })));

        // the removal of Drama was rolled back with the failed addition
        let stored = ledger.links(AssociationKind::MovieGenres, movie).await.unwrap();
        assert_eq!(stored.len(), 1);
    }
}
