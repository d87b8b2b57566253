//! Movie read endpoints
//!
//! - GET /movies
//! - GET /movies/:id (composed view)
//! - GET /movies/:id/people, /genres, /images, /reviews
//! - GET /genres, GET /genres/by-name/:name
//! - GET /people/:id (with filmography)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db::genres::{self, Genre};
use crate::db::images::ImageRef;
use crate::db::movies::{self, CastMember, GenreRef, Movie};
use crate::db::people::{self, Person};
use crate::db::reviews::Review;
use crate::error::{ApiError, ApiResult};
use crate::models::ComposedMovie;
use crate::AppState;

async fn require_movie(state: &AppState, movie_id: Uuid) -> ApiResult<Movie> {
    movies::load_movie(&state.db, movie_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Movie not found: {}", movie_id)))
}

/// GET /movies
pub async fn list_movies(State(state): State<AppState>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(movies::list_movies(&state.db).await?))
}

/// GET /movies/:id
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> ApiResult<Json<ComposedMovie>> {
    Ok(Json(state.composer.compose_movie(movie_id).await?))
}

/// GET /movies/:id/people
pub async fn get_movie_people(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CastMember>>> {
    require_movie(&state, movie_id).await?;
    Ok(Json(movies::movie_people(&state.db, movie_id).await?))
}

/// GET /movies/:id/genres
pub async fn get_movie_genres(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> ApiResult<Json<Vec<GenreRef>>> {
    require_movie(&state, movie_id).await?;
    Ok(Json(movies::movie_genres(&state.db, movie_id).await?))
}

/// GET /movies/:id/images
///
/// Unlike the composed view, a collaborator failure here is an error (502).
pub async fn get_movie_images(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ImageRef>>> {
    require_movie(&state, movie_id).await?;
    Ok(Json(state.images.images_for_movie(movie_id).await?))
}

/// GET /movies/:id/reviews
pub async fn get_movie_reviews(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.reviews.for_movie(movie_id).await?))
}

/// One movie a person appears in
#[derive(Debug, Serialize)]
pub struct Credit {
    pub movie_id: Uuid,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct PersonDetail {
    #[serde(flatten)]
    pub person: Person,
    pub credits: Vec<Credit>,
}

/// GET /genres
pub async fn list_genres(State(state): State<AppState>) -> ApiResult<Json<Vec<Genre>>> {
    Ok(Json(genres::list_genres(&state.db).await?))
}

/// GET /genres/by-name/:name
///
/// Any spelling that normalizes to the same key finds the genre.
pub async fn get_genre_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Genre>> {
    genres::load_genre_by_name(&state.db, &name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Genre not found: {}", name)))
}

/// GET /people/:id
pub async fn get_person(
    State(state): State<AppState>,
    Path(person_id): Path<Uuid>,
) -> ApiResult<Json<PersonDetail>> {
    let person = people::load_person(&state.db, person_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Person not found: {}", person_id)))?;
    let credits = people::person_movies(&state.db, person_id)
        .await?
        .into_iter()
        .map(|(movie_id, role)| Credit { movie_id, role })
        .collect();

    Ok(Json(PersonDetail { person, credits }))
}

pub fn movie_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/:id", get(get_movie))
        .route("/movies/:id/people", get(get_movie_people))
        .route("/movies/:id/genres", get(get_movie_genres))
        .route("/movies/:id/images", get(get_movie_images))
        .route("/movies/:id/reviews", get(get_movie_reviews))
        .route("/genres", get(list_genres))
        .route("/genres/by-name/:name", get(get_genre_by_name))
        .route("/people/:id", get(get_person))
}
