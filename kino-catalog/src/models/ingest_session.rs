//! Ingestion state machine
//!
//! One session per raw record:
//! FETCHED → MOVIE_RESOLVED → PEOPLE_RESOLVED → GENRES_RESOLVED →
//! ASSOCIATIONS_RECONCILED → DONE, or FAILED / CANCELLED from any step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ingestion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestState {
    /// Record received and validated
    Fetched,
    MovieResolved,
    PeopleResolved,
    GenresResolved,
    /// People, genre and image sets replaced
    AssociationsReconciled,
    Done,
    /// A step failed; earlier steps stay committed
    Failed,
    /// Stopped by its cancellation token between steps
    Cancelled,
}

impl IngestState {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestState::Fetched => "FETCHED",
            IngestState::MovieResolved => "MOVIE_RESOLVED",
            IngestState::PeopleResolved => "PEOPLE_RESOLVED",
            IngestState::GenresResolved => "GENRES_RESOLVED",
            IngestState::AssociationsReconciled => "ASSOCIATIONS_RECONCILED",
            IngestState::Done => "DONE",
            IngestState::Failed => "FAILED",
            IngestState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IngestState::Done | IngestState::Failed | IngestState::Cancelled
        )
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: IngestState,
    pub new_state: IngestState,
    pub transitioned_at: DateTime<Utc>,
}

/// Ingestion session (in-memory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSession {
    pub session_id: Uuid,
    pub external_id: String,
    pub state: IngestState,
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    /// Set on entering a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl IngestSession {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            external_id: external_id.into(),
            state: IngestState::Fetched,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            error: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: IngestState) {
        let now = Utc::now();
        self.transitions.push(StateTransition {
            old_state: self.state,
            new_state,
            transitioned_at: now,
        });
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(now);
        }
    }

    /// Enter FAILED, keeping the last state reached for diagnostics
    pub fn fail(&mut self, message: impl Into<String>) -> IngestState {
        let reached = self.state;
        self.error = Some(message.into());
        self.transition_to(IngestState::Failed);
        reached
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_records_transitions() {
        let mut session = IngestSession::new("tt1");
        session.transition_to(IngestState::MovieResolved);
        session.transition_to(IngestState::PeopleResolved);

        assert_eq!(session.transitions.len(), 2);
        assert_eq!(session.transitions[0].old_state, IngestState::Fetched);
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_fail_reports_reached_state() {
        let mut session = IngestSession::new("tt1");
        session.transition_to(IngestState::MovieResolved);

        let reached = session.fail("boom");
        assert_eq!(reached, IngestState::MovieResolved);
        assert_eq!(session.state, IngestState::Failed);
        assert!(session.is_terminal());
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_state_serializes_screaming_snake() {
        let json = serde_json::to_string(&IngestState::AssociationsReconciled).unwrap();
        assert_eq!(json, "\"ASSOCIATIONS_RECONCILED\"");
    }
}
