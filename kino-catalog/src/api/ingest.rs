//! Ingestion endpoint

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::error::ApiResult;
use crate::models::{IngestReport, RawMovieRecord};
use crate::AppState;

/// POST /ingest
///
/// **Request:** a raw movie record
/// **Response:** the ingestion report
pub async fn ingest_record(
    State(state): State<AppState>,
    Json(record): Json<RawMovieRecord>,
) -> ApiResult<Json<IngestReport>> {
    info!(external_id = %record.external_id, "Ingest requested");
    Ok(Json(state.orchestrator.ingest(&record).await?))
}

pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/ingest", post(ingest_record))
}
