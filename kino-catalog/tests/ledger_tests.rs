//! Association ledger guard tests

mod helpers;

use kino_catalog::db::roles::get_role_by_value;
use kino_catalog::services::{AssociationKind, AssociationLedger, EntityResolver, Link};
use kino_catalog::CatalogError;
use uuid::Uuid;

use helpers::{count_rows, create_test_db, create_test_state};

#[tokio::test]
async fn test_user_role_guarded_on_add_and_remove() {
    let (_dir, state) = create_test_state().await.unwrap();
    let user = state.users.create_user("a@example.com", None).await.unwrap();
    let user_role = get_role_by_value(&state.db, "USER").await.unwrap().unwrap();

    let add = state
        .ledger
        .add(AssociationKind::UserRoles, user.guid, &Link::new(user_role.guid))
        .await;
    assert!(matches!(add, Err(CatalogError::ProtectedValue(ref v)) if v == "USER"));

    let remove = state
        .ledger
        .remove(AssociationKind::UserRoles, user.guid, &Link::new(user_role.guid))
        .await;
    assert!(matches!(remove, Err(CatalogError::ProtectedValue(_))));

    // the creation-time link is untouched
    assert_eq!(count_rows(&state.db, "user_roles").await.unwrap(), 1);
}

#[tokio::test]
async fn test_other_roles_not_guarded() {
    let (_dir, state) = create_test_state().await.unwrap();
    let user = state.users.create_user("a@example.com", None).await.unwrap();
    let admin = get_role_by_value(&state.db, "ADMIN").await.unwrap().unwrap();

    let added = state
        .ledger
        .add(AssociationKind::UserRoles, user.guid, &Link::new(admin.guid))
        .await
        .unwrap();
    assert!(added.created);
}

#[tokio::test]
async fn test_reconcile_cannot_drop_protected_link() {
    let (_dir, state) = create_test_state().await.unwrap();
    let user = state.users.create_user("a@example.com", None).await.unwrap();

    let result = state
        .ledger
        .replace_set(AssociationKind::UserRoles, user.guid, &[])
        .await;
    assert!(matches!(result, Err(CatalogError::ProtectedValue(_))));
    assert_eq!(state.users.get_user_by_id(user.guid).await.unwrap().roles, vec!["USER"]);
}

#[tokio::test]
async fn test_referential_guard_leaves_table_unchanged() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let resolver = EntityResolver::new(pool.clone(), 5000);
    let ledger = AssociationLedger::new(pool.clone(), 5000);

    let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
    let person = resolver.resolve_person("p1", None).await.unwrap().id;
    ledger
        .add(AssociationKind::MoviePeople, movie, &Link::with_attribute(person, "actor"))
        .await
        .unwrap();

    let missing = Uuid::new_v4();
    let err = ledger
        .add(AssociationKind::MoviePeople, movie, &Link::with_attribute(missing, "actor"))
        .await
        .unwrap_err();

    match err {
        CatalogError::NotFound { entity, id } => {
            assert_eq!(entity, "Person");
            assert_eq!(id, missing.to_string());
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert_eq!(count_rows(&pool, "movie_people").await.unwrap(), 1);
}

#[tokio::test]
async fn test_reconcile_convergence_across_overlaps() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let resolver = EntityResolver::new(pool.clone(), 5000);
    let ledger = AssociationLedger::new(pool.clone(), 5000);

    let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
    let mut genres = Vec::new();
    for name in ["Drama", "Comedy", "Horror", "Western"] {
        genres.push(resolver.resolve_genre(name).await.unwrap().id);
    }

    let cases: Vec<(Vec<usize>, Vec<usize>)> = vec![
        (vec![0, 1], vec![2, 3]),
        (vec![0, 1], vec![1, 2]),
        (vec![0, 1, 2], vec![0, 1, 2]),
        (vec![], vec![3]),
        (vec![3], vec![]),
    ];

    for (a, b) in cases {
        let links = |indices: &[usize]| -> Vec<Link> {
            indices.iter().map(|&i| Link::new(genres[i])).collect()
        };

        ledger
            .replace_set(AssociationKind::MovieGenres, movie, &links(&a))
            .await
            .unwrap();
        ledger
            .replace_set(AssociationKind::MovieGenres, movie, &links(&b))
            .await
            .unwrap();

        let stored = ledger.links(AssociationKind::MovieGenres, movie).await.unwrap();
        let expected: std::collections::BTreeSet<Link> = links(&b).into_iter().collect();
        assert_eq!(stored, expected, "A={:?} B={:?}", a, b);
    }
}
