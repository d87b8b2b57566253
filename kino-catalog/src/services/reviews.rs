//! Review service
//!
//! Thin layer over `db::reviews` that turns missing rows into `NotFound`
//! and publishes rate changes.

use chrono::Utc;
use kino_common::events::{CatalogEvent, EventBus};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::reviews::{self, RateChange, Review};
use crate::error::{CatalogError, CatalogResult};

#[derive(Clone)]
pub struct Reviews {
    db: SqlitePool,
    event_bus: EventBus,
}

impl Reviews {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    pub async fn create(
        &self,
        movie_id: Uuid,
        user_id: Uuid,
        title: &str,
        text: &str,
    ) -> CatalogResult<Review> {
        reviews::create_review(&self.db, movie_id, user_id, title, text).await
    }

    pub async fn get(&self, review_id: Uuid) -> CatalogResult<Review> {
        reviews::get_review(&self.db, review_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Review", review_id))
    }

    pub async fn for_movie(&self, movie_id: Uuid) -> CatalogResult<Vec<Review>> {
        reviews::reviews_for_movie(&self.db, movie_id).await
    }

    pub async fn for_user(&self, user_id: Uuid) -> CatalogResult<Vec<Review>> {
        reviews::reviews_for_user(&self.db, user_id).await
    }

    pub async fn update(
        &self,
        review_id: Uuid,
        title: Option<&str>,
        text: Option<&str>,
    ) -> CatalogResult<Review> {
        reviews::update_review(&self.db, review_id, title, text).await
    }

    pub async fn remove(&self, review_id: Uuid) -> CatalogResult<bool> {
        reviews::remove_review(&self.db, review_id).await
    }

    pub async fn remove_for_user(&self, user_id: Uuid) -> CatalogResult<u64> {
        reviews::remove_reviews_for_user(&self.db, user_id).await
    }

    /// Step the rate and return the updated review
    pub async fn change_rate(&self, review_id: Uuid, change: RateChange) -> CatalogResult<Review> {
        let rate = reviews::change_rate(&self.db, review_id, change).await?;
        tracing::debug!(review_id = %review_id, ?change, rate, "Review rate changed");

        self.event_bus.emit_lossy(CatalogEvent::ReviewRateChanged {
            review_id,
            rate,
            timestamp: Utc::now(),
        });

        self.get(review_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn test_change_rate_emits_new_rate() {
        let (_dir, pool) = test_pool().await;
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let service = Reviews::new(pool, bus);

        let review = service
            .create(Uuid::new_v4(), Uuid::new_v4(), "t", "body")
            .await
            .unwrap();
        let updated = service.change_rate(review.guid, RateChange::Decrease).await.unwrap();
        assert_eq!(updated.rate, -1);

        match rx.recv().await.unwrap() {
            CatalogEvent::ReviewRateChanged { review_id, rate, .. } => {
                assert_eq!(review_id, review.guid);
                assert_eq!(rate, -1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_missing_review() {
        let (_dir, pool) = test_pool().await;
        let service = Reviews::new(pool, EventBus::new(10));
        let result = service.get(Uuid::new_v4()).await;
        assert!(matches!(result, Err(CatalogError::NotFound { entity: "Review", .. })));
    }
}
