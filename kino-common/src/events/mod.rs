//! Event system for Kino
//!
//! Provides shared event definitions and the EventBus used by the catalog
//! services to publish changes to other contexts.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Direction of a user role change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleChange {
    Added,
    Removed,
}

/// Kino event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they
/// can be forwarded as message payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// An external movie record finished ingestion
    MovieIngested {
        movie_id: Uuid,
        external_id: String,
        /// Number of movie-person links after reconciliation
        people_linked: usize,
        /// Number of movie-genre links after reconciliation
        genres_linked: usize,
        /// True if the movie row was created by this run
        created: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ingestion aborted; steps completed before `state` stay committed
    IngestFailed {
        external_id: String,
        /// Last state reached before the failure
        state: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user account was created (with the default role)
    UserCreated {
        user_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A role was added to or removed from a user
    UserRoleChanged {
        user_id: Uuid,
        role: String,
        change: RoleChange,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A review's rate moved up or down
    ReviewRateChanged {
        review_id: Uuid,
        rate: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CatalogEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::MovieIngested { .. } => "MovieIngested",
            CatalogEvent::IngestFailed { .. } => "IngestFailed",
            CatalogEvent::UserCreated { .. } => "UserCreated",
            CatalogEvent::UserRoleChanged { .. } => "UserRoleChanged",
            CatalogEvent::ReviewRateChanged { .. } => "ReviewRateChanged",
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: CatalogEvent,
    ) -> Result<usize, broadcast::error::SendError<CatalogEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, logging instead of failing when nobody listens
    pub fn emit_lossy(&self, event: CatalogEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            tracing::trace!(event_type, "No subscribers for event");
        }
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let user_id = Uuid::new_v4();
        bus.emit(CatalogEvent::UserCreated {
            user_id,
            timestamp: chrono::Utc::now(),
        })
        .expect("one subscriber");

        match rx.recv().await.unwrap() {
            CatalogEvent::UserCreated { user_id: got, .. } => assert_eq!(got, user_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let event = CatalogEvent::UserCreated {
            user_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());

        // lossy variant swallows the missing-subscriber case
        bus.emit_lossy(event);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CatalogEvent::UserRoleChanged {
            user_id: Uuid::nil(),
            role: "ADMIN".to_string(),
            change: RoleChange::Added,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UserRoleChanged");
        assert_eq!(json["change"], "added");
        assert_eq!(event.event_type(), "UserRoleChanged");
    }
}
