//! Concurrency tests
//!
//! Many tasks racing on the same natural keys and links must leave exactly
//! one row behind.

mod helpers;

use std::collections::HashSet;

use kino_catalog::db::people::load_person_by_external_id;
use kino_catalog::models::RawMovieRecord;
use kino_catalog::services::{AssociationKind, AssociationLedger, EntityResolver, Link};
use serde_json::json;
use tokio::task::JoinSet;

use helpers::{count_rows, create_test_db, create_test_state};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_creates_one_row() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let resolver = EntityResolver::new(pool.clone(), 5000);

    let mut tasks = JoinSet::new();
    for i in 0..16 {
        let resolver = resolver.clone();
        tasks.spawn(async move {
            let name = format!("Alice {}", i);
            resolver.resolve_person("p1", Some(&name)).await
        });
    }

    let mut ids = HashSet::new();
    let mut created = 0;
    while let Some(joined) = tasks.join_next().await {
        let resolution = joined.unwrap().unwrap();
        ids.insert(resolution.id);
        if resolution.created {
            created += 1;
        }
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(created, 1);
    assert_eq!(count_rows(&pool, "people").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingests_share_person() {
    let (_dir, state) = create_test_state().await.unwrap();

    let records: Vec<RawMovieRecord> = vec![
        serde_json::from_value(json!({
            "external_id": "tt1",
            "people": [{"external_id": "p1", "name": "Alice", "role": "actor"}]
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "external_id": "tt2",
            "people": [{"external_id": "p1", "name": "Alice Smith", "role": "actor"}]
        }))
        .unwrap(),
    ];

    let mut tasks = JoinSet::new();
    for raw in records {
        let orchestrator = state.orchestrator.clone();
        tasks.spawn(async move { orchestrator.ingest(&raw).await });
    }

    let mut linked = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let report = joined.unwrap().unwrap();
        assert_eq!(report.people.len(), 1);
        linked.insert(report.people[0].person_id);
    }

    assert_eq!(linked.len(), 1);
    assert_eq!(count_rows(&state.db, "people").await.unwrap(), 1);
    assert_eq!(count_rows(&state.db, "movie_people").await.unwrap(), 2);

    let person = load_person_by_external_id(&state.db, "p1").await.unwrap().unwrap();
    let name = person.name.unwrap();
    assert!(name == "Alice" || name == "Alice Smith", "unexpected name {}", name);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_keep_one_link() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let resolver = EntityResolver::new(pool.clone(), 5000);
    let ledger = AssociationLedger::new(pool.clone(), 5000);

    let movie = resolver.resolve_movie("tt1", None, None).await.unwrap().id;
    let genre = resolver.resolve_genre("Drama").await.unwrap().id;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            ledger
                .add(AssociationKind::MovieGenres, movie, &Link::new(genre))
                .await
        });
    }

    let mut created = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.unwrap().unwrap().created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(count_rows(&pool, "movie_genres").await.unwrap(), 1);
}
