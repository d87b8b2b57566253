//! Composition reader
//!
//! Assembles a movie with its cast, genres and images. The movie row and
//! its links are required; the image section is best-effort and degrades to
//! `Section::Unavailable` when the collaborator errors or times out.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::images::ImageRef;
use crate::db::movies::{load_movie, movie_genres, movie_people};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{ComposedMovie, Section};
use crate::services::image_store::ImageStore;

#[derive(Clone)]
pub struct CompositionReader {
    db: SqlitePool,
    images: Arc<dyn ImageStore>,
    timeout: Duration,
}

impl CompositionReader {
    pub fn new(db: SqlitePool, images: Arc<dyn ImageStore>, timeout: Duration) -> Self {
        Self { db, images, timeout }
    }

    /// Compose a movie view; `NotFound` only if the movie itself is absent
    pub async fn compose_movie(&self, movie_id: Uuid) -> CatalogResult<ComposedMovie> {
        let movie = load_movie(&self.db, movie_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Movie", movie_id))?;

        let people = movie_people(&self.db, movie_id).await?;
        let genres = movie_genres(&self.db, movie_id).await?;
        let images = self.image_section(movie_id).await;

        Ok(ComposedMovie {
            movie,
            people,
            genres,
            images,
        })
    }

    async fn image_section(&self, movie_id: Uuid) -> Section<ImageRef> {
        match tokio::time::timeout(self.timeout, self.images.images_for_movie(movie_id)).await {
            Ok(Ok(items)) => Section::Available { items },
            Ok(Err(e)) => {
                warn!(
                    collaborator = self.images.name(),
                    movie_id = %movie_id,
                    error = %e,
                    "Collaborator failed; serving partial composition"
                );
                Section::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    collaborator = self.images.name(),
                    movie_id = %movie_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Collaborator timed out; serving partial composition"
                );
                Section::Unavailable {
                    reason: format!(
                        "{} did not answer within {} ms",
                        self.images.name(),
                        self.timeout.as_millis()
                    ),
                }
            }
        }
    }
}
