//! kino-catalog library interface
//!
//! Entity resolution and association engine for the movie catalog, the
//! user/role and review services built on it, and their HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, CatalogError, CatalogResult};

use axum::Router;
use chrono::{DateTime, Utc};
use kino_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::settings::CatalogSettings;
use crate::services::{
    AssociationLedger, CompositionReader, EntityResolver, ImageStore, IngestOrchestrator,
    Reconciler, Reviews, SqliteImageStore, UserAccounts,
};

/// Application state shared across handlers
///
/// Every service is built here from the pool, the event bus and the image
/// collaborator; nothing is registered globally.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub settings: CatalogSettings,
    /// Image collaborator (local table or remote service)
    pub images: Arc<dyn ImageStore>,
    pub ledger: AssociationLedger,
    pub orchestrator: Arc<IngestOrchestrator>,
    pub composer: CompositionReader,
    pub users: UserAccounts,
    pub reviews: Reviews,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        settings: CatalogSettings,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let max_wait = settings.max_lock_wait_ms;
        let ledger = AssociationLedger::new(db.clone(), max_wait);
        let resolver = EntityResolver::new(db.clone(), max_wait);
        let reconciler = Reconciler::new(ledger.clone());

        let orchestrator = Arc::new(IngestOrchestrator::new(
            db.clone(),
            resolver,
            reconciler,
            Arc::clone(&images),
            event_bus.clone(),
        ));
        let composer = CompositionReader::new(
            db.clone(),
            Arc::clone(&images),
            settings.collaborator_timeout(),
        );
        let users = UserAccounts::new(db.clone(), ledger.clone(), event_bus.clone(), max_wait);
        let reviews = Reviews::new(db.clone(), event_bus.clone());

        Self {
            db,
            event_bus,
            settings,
            images,
            ledger,
            orchestrator,
            composer,
            users,
            reviews,
            startup_time: Utc::now(),
        }
    }

    /// State backed by the local images table
    pub fn with_local_images(db: SqlitePool, event_bus: EventBus, settings: CatalogSettings) -> Self {
        let images: Arc<dyn ImageStore> =
            Arc::new(SqliteImageStore::new(db.clone(), settings.max_lock_wait_ms));
        Self::new(db, event_bus, settings, images)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::movie_routes())
        .merge(api::ingest_routes())
        .merge(api::user_routes())
        .merge(api::review_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
