//! Image collaborator
//!
//! Images are owned by a separate store. The catalog reads them for
//! composed views and hands the ingested set over as a full replace.
//! `SqliteImageStore` keeps them in the local `images` table;
//! `HttpImageSource` talks to a remote images service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use crate::db::images::{images_for_movie, replace_movie_images_in, ImageRef, NewImage};
use crate::error::{CatalogError, CatalogResult};
use crate::utils::{begin_monitored, retry_on_lock};

const USER_AGENT: &str = concat!("kino-catalog/", env!("CARGO_PKG_VERSION"));

/// Counts from one image-set replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSync {
    pub added: usize,
    pub removed: usize,
}

/// Image collaborator interface
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Collaborator name used in errors and logs
    fn name(&self) -> &'static str;

    async fn images_for_movie(&self, movie_id: Uuid) -> CatalogResult<Vec<ImageRef>>;

    /// Replace the image set of a movie; urls absent from `images` are dropped
    async fn replace_movie_images(
        &self,
        movie_id: Uuid,
        images: &[NewImage],
    ) -> CatalogResult<ImageSync>;
}

/// Images kept in the catalog database
#[derive(Clone)]
pub struct SqliteImageStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteImageStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }
}

#[async_trait]
impl ImageStore for SqliteImageStore {
    fn name(&self) -> &'static str {
        "images"
    }

    async fn images_for_movie(&self, movie_id: Uuid) -> CatalogResult<Vec<ImageRef>> {
        images_for_movie(&self.pool, movie_id).await
    }

    async fn replace_movie_images(
        &self,
        movie_id: Uuid,
        images: &[NewImage],
    ) -> CatalogResult<ImageSync> {
        let pool = &self.pool;
        retry_on_lock("image_store::replace_movie_images", self.max_lock_wait_ms, || async {
            let mut tx = begin_monitored(pool, "image_store::replace_movie_images").await?;
            let (added, removed) = replace_movie_images_in(tx.conn(), movie_id, images).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(ImageSync { added, removed })
        })
        .await
    }
}

/// Remote images service client
///
/// `GET {base}/movies/{id}/images` returns the image list;
/// `PUT` to the same path replaces it and answers with an `ImageSync`.
pub struct HttpImageSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpImageSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CatalogResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| collaborator_error(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn images_url(&self, movie_id: Uuid) -> String {
        format!("{}/movies/{}/images", self.base_url, movie_id)
    }
}

fn collaborator_error(message: String) -> CatalogError {
    CatalogError::Collaborator {
        collaborator: "images",
        message,
    }
}

async fn check_status(response: reqwest::Response) -> CatalogResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(collaborator_error(format!(
        "HTTP {}: {}",
        status.as_u16(),
        error_text
    )))
}

#[async_trait]
impl ImageStore for HttpImageSource {
    fn name(&self) -> &'static str {
        "images"
    }

    async fn images_for_movie(&self, movie_id: Uuid) -> CatalogResult<Vec<ImageRef>> {
        let url = self.images_url(movie_id);
        tracing::debug!(movie_id = %movie_id, url = %url, "Fetching images");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| collaborator_error(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| collaborator_error(format!("Invalid response: {}", e)))
    }

    async fn replace_movie_images(
        &self,
        movie_id: Uuid,
        images: &[NewImage],
    ) -> CatalogResult<ImageSync> {
        let url = self.images_url(movie_id);
        tracing::debug!(movie_id = %movie_id, url = %url, count = images.len(), "Replacing images");

        let response = self
            .http_client
            .put(&url)
            .json(images)
            .send()
            .await
            .map_err(|e| collaborator_error(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| collaborator_error(format!("Invalid response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_resolver::EntityResolver;
    use crate::test_support::test_pool;

    fn image(url: &str, kind: &str) -> NewImage {
        NewImage {
            url: url.to_string(),
            kind: kind.to_string(),
        }
    }

    #[tokio::test]
    async fn test_replace_is_keyed_by_url() {
        let (_dir, pool) = test_pool().await;
        let movie = EntityResolver::new(pool.clone(), 5000)
            .resolve_movie("tt1", None, None)
            .await
            .unwrap()
            .id;
        let store = SqliteImageStore::new(pool, 5000);

        let first = store
            .replace_movie_images(movie, &[image("http://a", "poster"), image("http://b", "still")])
            .await
            .unwrap();
        assert_eq!(first, ImageSync { added: 2, removed: 0 });

        let second = store
            .replace_movie_images(movie, &[image("http://b", "backdrop"), image("http://c", "poster")])
            .await
            .unwrap();
        assert_eq!(second, ImageSync { added: 1, removed: 1 });

        let stored = store.images_for_movie(movie).await.unwrap();
        let urls: Vec<_> = stored.iter().map(|i| (i.url.as_str(), i.kind.as_str())).collect();
        assert_eq!(urls, vec![("http://b", "backdrop"), ("http://c", "poster")]);
    }

    #[tokio::test]
    async fn test_replace_for_missing_movie() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteImageStore::new(pool, 5000);

        let result = store
            .replace_movie_images(Uuid::new_v4(), &[image("http://a", "poster")])
            .await;
        assert!(matches!(result, Err(CatalogError::NotFound { entity: "Movie", .. })));
    }

    #[tokio::test]
    async fn test_http_source_unreachable_is_collaborator_error() {
        // port 9 (discard) on localhost is expected to refuse connections
        let source = HttpImageSource::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let result = source.images_for_movie(Uuid::new_v4()).await;
        assert!(matches!(result, Err(CatalogError::Collaborator { .. })));
    }
}
