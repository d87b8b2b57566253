//! Review endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::reviews::{RateChange, Review};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(alias = "movieId")]
    pub movie_id: Uuid,
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub change: RateChange,
}

#[derive(Debug, Deserialize)]
pub struct ReviewFilter {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

/// POST /reviews
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = state
        .reviews
        .create(request.movie_id, request.user_id, &request.title, &request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /reviews?user_id=
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> ApiResult<Json<Vec<Review>>> {
    let user_id = filter
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".to_string()))?;
    Ok(Json(state.reviews.for_user(user_id).await?))
}

/// DELETE /reviews?user_id=
pub async fn remove_user_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> ApiResult<Json<RemovedResponse>> {
    let user_id = filter
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".to_string()))?;
    let removed = state.reviews.remove_for_user(user_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// GET /reviews/:id
pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<Json<Review>> {
    Ok(Json(state.reviews.get(review_id).await?))
}

/// PUT /reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(request): Json<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    Ok(Json(
        state
            .reviews
            .update(review_id, request.title.as_deref(), request.text.as_deref())
            .await?,
    ))
}

/// DELETE /reviews/:id
pub async fn remove_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.reviews.remove(review_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Review not found: {}", review_id)))
    }
}

/// POST /reviews/:id/rate
///
/// **Request:** `{"change": "increase"}` or `{"change": "decrease"}`
pub async fn rate_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> ApiResult<Json<Review>> {
    Ok(Json(state.reviews.change_rate(review_id, request.change).await?))
}

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/reviews",
            post(create_review).get(list_reviews).delete(remove_user_reviews),
        )
        .route(
            "/reviews/:id",
            get(get_review).put(update_review).delete(remove_review),
        )
        .route("/reviews/:id/rate", post(rate_review))
}
