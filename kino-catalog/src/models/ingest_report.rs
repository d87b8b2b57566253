//! Result of one successful ingestion

use serde::Serialize;
use uuid::Uuid;

use crate::db::movies::Movie;
use crate::models::ingest_session::{IngestState, StateTransition};
use crate::services::reconciler::ReconcileDiff;

/// Person linked by an ingestion, with the role it was linked under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedPerson {
    pub person_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub session_id: Uuid,
    pub movie: Movie,
    /// True if this run created the movie row
    pub created: bool,
    pub people: Vec<LinkedPerson>,
    pub genres: Vec<Uuid>,
    pub people_diff: ReconcileDiff,
    pub genres_diff: ReconcileDiff,
    pub images_added: usize,
    pub images_removed: usize,
    pub state: IngestState,
    pub transitions: Vec<StateTransition>,
}

impl IngestReport {
    /// True if the run changed no association or image
    pub fn is_quiet(&self) -> bool {
        !self.created
            && !self.people_diff.is_churn()
            && !self.genres_diff.is_churn()
            && self.images_added == 0
            && self.images_removed == 0
    }
}
