//! Ingestion orchestrator
//!
//! Drives one raw movie record through resolution and reconciliation:
//! movie, then people, then genres, then the people/genre/image sets.
//! Each step commits on its own; a failed or cancelled run keeps what
//! earlier steps wrote, and re-running the same record converges.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use kino_common::events::{CatalogEvent, EventBus};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::movies::load_movie;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{IngestReport, IngestSession, IngestState, LinkedPerson, RawMovieRecord};
use crate::services::association_ledger::{AssociationKind, Link};
use crate::services::entity_resolver::EntityResolver;
use crate::services::image_store::ImageStore;
use crate::services::reconciler::Reconciler;

pub struct IngestOrchestrator {
    db: SqlitePool,
    resolver: EntityResolver,
    reconciler: Reconciler,
    images: Arc<dyn ImageStore>,
    event_bus: EventBus,
}

/// Stop before the next step if cancellation was requested
fn checkpoint(cancel: &CancellationToken, session: &IngestSession) -> CatalogResult<()> {
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled(session.state.to_string()));
    }
    Ok(())
}

impl IngestOrchestrator {
    pub fn new(
        db: SqlitePool,
        resolver: EntityResolver,
        reconciler: Reconciler,
        images: Arc<dyn ImageStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            resolver,
            reconciler,
            images,
            event_bus,
        }
    }

    pub async fn ingest(&self, record: &RawMovieRecord) -> CatalogResult<IngestReport> {
        self.ingest_with_cancel(record, &CancellationToken::new()).await
    }

    /// Ingest a record, checking `cancel` between steps
    pub async fn ingest_with_cancel(
        &self,
        record: &RawMovieRecord,
        cancel: &CancellationToken,
    ) -> CatalogResult<IngestReport> {
        let mut session = IngestSession::new(record.external_id.trim());
        info!(
            session_id = %session.session_id,
            external_id = %session.external_id,
            people = record.people.len(),
            genres = record.genres.len(),
            "Starting ingestion"
        );

        match self.run(record, &mut session, cancel).await {
            Ok(report) => {
                info!(
                    session_id = %session.session_id,
                    movie_id = %report.movie.guid,
                    created = report.created,
                    people_added = report.people_diff.added,
                    people_removed = report.people_diff.removed,
                    genres_added = report.genres_diff.added,
                    genres_removed = report.genres_diff.removed,
                    "Ingestion complete"
                );
                self.event_bus.emit_lossy(CatalogEvent::MovieIngested {
                    movie_id: report.movie.guid,
                    external_id: session.external_id.clone(),
                    people_linked: report.people.len(),
                    genres_linked: report.genres.len(),
                    created: report.created,
                    timestamp: Utc::now(),
                });
                Ok(report)
            }
            Err(CatalogError::Cancelled(reached)) => {
                session.transition_to(IngestState::Cancelled);
                warn!(
                    session_id = %session.session_id,
                    external_id = %session.external_id,
                    reached = %reached,
                    "Ingestion cancelled"
                );
                Err(CatalogError::Cancelled(reached))
            }
            Err(err) => {
                let reached = session.fail(err.to_string());
                warn!(
                    session_id = %session.session_id,
                    external_id = %session.external_id,
                    state = %reached,
                    error = %err,
                    "Ingestion failed"
                );
                self.event_bus.emit_lossy(CatalogEvent::IngestFailed {
                    external_id: session.external_id.clone(),
                    state: reached.to_string(),
                    message: err.to_string(),
                    timestamp: Utc::now(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        record: &RawMovieRecord,
        session: &mut IngestSession,
        cancel: &CancellationToken,
    ) -> CatalogResult<IngestReport> {
        record.validate()?;
        checkpoint(cancel, session)?;

        let movie = self
            .resolver
            .resolve_movie(&record.external_id, record.title.as_deref(), record.release_year)
            .await?;
        session.transition_to(IngestState::MovieResolved);
        checkpoint(cancel, session)?;

        let mut people = Vec::with_capacity(record.people.len());
        let mut seen_people = HashSet::new();
        for raw in &record.people {
            let person = self
                .resolver
                .resolve_person(&raw.external_id, raw.name.as_deref())
                .await?;
            let role = raw.normalized_role();
            if seen_people.insert((person.id, role.clone())) {
                people.push(LinkedPerson {
                    person_id: person.id,
                    role,
                });
            }
        }
        session.transition_to(IngestState::PeopleResolved);
        checkpoint(cancel, session)?;

        let mut genres: Vec<Uuid> = Vec::with_capacity(record.genres.len());
        for raw in &record.genres {
            let genre = self.resolver.resolve_genre(raw.name()).await?;
            if !genres.contains(&genre.id) {
                genres.push(genre.id);
            }
        }
        session.transition_to(IngestState::GenresResolved);
        checkpoint(cancel, session)?;

        let people_links: Vec<Link> = people
            .iter()
            .map(|p| Link::with_attribute(p.person_id, p.role.clone()))
            .collect();
        let people_diff = self
            .reconciler
            .reconcile(AssociationKind::MoviePeople, movie.id, &people_links)
            .await?;

        let genre_links: Vec<Link> = genres.iter().copied().map(Link::new).collect();
        let genres_diff = self
            .reconciler
            .reconcile(AssociationKind::MovieGenres, movie.id, &genre_links)
            .await?;

        let image_sync = self
            .images
            .replace_movie_images(movie.id, &record.new_images())
            .await?;
        session.transition_to(IngestState::AssociationsReconciled);

        let stored = load_movie(&self.db, movie.id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Movie", movie.id))?;
        session.transition_to(IngestState::Done);

        Ok(IngestReport {
            session_id: session.session_id,
            movie: stored,
            created: movie.created,
            people,
            genres,
            people_diff,
            genres_diff,
            images_added: image_sync.added,
            images_removed: image_sync.removed,
            state: session.state,
            transitions: session.transitions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::movies::{load_movie_by_external_id, movie_genres, movie_people};
    use crate::services::association_ledger::AssociationLedger;
    use crate::services::image_store::SqliteImageStore;
    use crate::test_support::test_pool;

    fn orchestrator(pool: &SqlitePool, bus: EventBus) -> IngestOrchestrator {
        IngestOrchestrator::new(
            pool.clone(),
            EntityResolver::new(pool.clone(), 5000),
            Reconciler::new(AssociationLedger::new(pool.clone(), 5000)),
            Arc::new(SqliteImageStore::new(pool.clone(), 5000)),
            bus,
        )
    }

    fn record(json: &str) -> RawMovieRecord {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_reaches_done_and_emits() {
        let (_dir, pool) = test_pool().await;
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let orchestrator = orchestrator(&pool, bus);

        let report = orchestrator
            .ingest(&record(
                r#"{"external_id": "tt1", "title": "A",
                    "people": [{"external_id": "p1", "name": "Alice", "role": "actor"}],
                    "genres": ["Drama"]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(report.state, IngestState::Done);
        assert!(report.created);
        assert_eq!(report.transitions.len(), 5);

        match rx.recv().await.unwrap() {
            CatalogEvent::MovieIngested {
                people_linked,
                genres_linked,
                created,
                ..
            } => {
                assert_eq!(people_linked, 1);
                assert_eq!(genres_linked, 1);
                assert!(created);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reingest_identical_record_is_quiet() {
        let (_dir, pool) = test_pool().await;
        let orchestrator = orchestrator(&pool, EventBus::new(10));
        let raw = record(
            r#"{"external_id": "tt1", "title": "A",
                "people": [{"external_id": "p1", "name": "Alice", "role": "actor"}],
                "genres": ["Drama"],
                "images": [{"url": "http://img/1"}]}"#,
        );

        let first = orchestrator.ingest(&raw).await.unwrap();
        let second = orchestrator.ingest(&raw).await.unwrap();

        assert_eq!(first.movie.guid, second.movie.guid);
        assert!(second.is_quiet());
    }

    #[tokio::test]
    async fn test_invalid_record_fails_in_fetched() {
        let (_dir, pool) = test_pool().await;
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let orchestrator = orchestrator(&pool, bus);

        let result = orchestrator
            .ingest(&record(
                r#"{"external_id": "tt1", "people": [{"external_id": "p1", "role": ""}]}"#,
            ))
            .await;
        assert!(matches!(result, Err(CatalogError::InvalidInput(_))));
        assert!(load_movie_by_external_id(&pool, "tt1").await.unwrap().is_none());

        match rx.recv().await.unwrap() {
            CatalogEvent::IngestFailed { state, .. } => assert_eq!(state, "FETCHED"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let (_dir, pool) = test_pool().await;
        let orchestrator = orchestrator(&pool, EventBus::new(10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .ingest_with_cancel(&record(r#"{"external_id": "tt1"}"#), &cancel)
            .await;
        assert!(matches!(result, Err(CatalogError::Cancelled(ref s)) if s == "FETCHED"));
        assert!(load_movie_by_external_id(&pool, "tt1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_people_entries_link_once() {
        let (_dir, pool) = test_pool().await;
        let orchestrator = orchestrator(&pool, EventBus::new(10));

        let report = orchestrator
            .ingest(&record(
                r#"{"external_id": "tt1",
                    "people": [
                        {"external_id": "p1", "name": "Alice", "role": "Actor"},
                        {"external_id": "p1", "name": "Alice", "role": "actor"},
                        {"external_id": "p1", "name": "Alice", "role": "director"}
                    ],
                    "genres": ["Drama", "drama"]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(report.people.len(), 2);
        assert_eq!(report.people_diff.added, 2);
        assert_eq!(report.genres.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_movie_step_keeps_movie_and_converges() {
        let (_dir, pool) = test_pool().await;
        let orchestrator = Arc::new(orchestrator(&pool, EventBus::new(10)));
        let input = record(
            r#"{"external_id": "tt9", "title": "Held",
                "people": [{"external_id": "p1", "name": "Alice", "role": "actor"}],
                "genres": ["Drama"]}"#,
        );

        // Hold the write lock so the movie insert is still pending when cancel lands
        let mut blocker = pool.begin().await.unwrap();
        sqlx::query("UPDATE settings SET value = value WHERE key = 'event_bus_capacity'")
            .execute(&mut *blocker)
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let run = {
            let orchestrator = Arc::clone(&orchestrator);
            let input = input.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { orchestrator.ingest_with_cancel(&input, &cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel.cancel();
        blocker.commit().await.unwrap();

        let result = run.await.unwrap();
        assert!(
            matches!(result, Err(CatalogError::Cancelled(ref s)) if s == "MOVIE_RESOLVED"),
            "unexpected result {:?}",
            result.map(|r| r.state)
        );

        let movie = load_movie_by_external_id(&pool, "tt9").await.unwrap().unwrap();
        assert_eq!(movie.title.as_deref(), Some("Held"));
        assert!(movie_people(&pool, movie.guid).await.unwrap().is_empty());
        assert!(movie_genres(&pool, movie.guid).await.unwrap().is_empty());

        let report = orchestrator.ingest(&input).await.unwrap();
        assert_eq!(report.state, IngestState::Done);
        assert!(!report.created);
        assert_eq!(report.movie.guid, movie.guid);
        assert_eq!(report.people_diff.added, 1);
        assert_eq!(report.genres_diff.added, 1);
        assert_eq!(movie_people(&pool, movie.guid).await.unwrap().len(), 1);
    }
}
