//! Notifications pushed to live-update clients.
//!
//! Every successful solution mutation emits a [`LiveEvent`] through the
//! [`super::EventBus`]. Events are encoded once into an [`EventFrame`] and
//! the same JSON text is delivered to every subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event published to live subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// First message on every subscription.
    Connected {
        /// Identifier assigned to the subscription.
        subscriber_id: Uuid,
    },

    /// A solution was submitted.
    NewSolution {
        /// New solution identifier.
        solution_id: i32,
    },

    /// A solution was edited.
    UpdateSolution {
        /// Edited solution identifier.
        solution_id: i32,
    },

    /// A solution was deleted.
    DeleteSolution {
        /// Deleted solution identifier.
        solution_id: i32,
    },
}

impl LiveEvent {
    /// Returns the event type as it appears on the wire.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::NewSolution { .. } => "new_solution",
            Self::UpdateSolution { .. } => "update_solution",
            Self::DeleteSolution { .. } => "delete_solution",
        }
    }

    /// Returns the small JSON payload carried with the event.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Connected { subscriber_id } => serde_json::json!({
                "message": "Connected",
                "subscriber_id": subscriber_id,
            }),
            Self::NewSolution { solution_id } => serde_json::json!({
                "message": "New solution added",
                "solution_id": solution_id,
            }),
            Self::UpdateSolution { solution_id } => serde_json::json!({
                "message": "Solution updated",
                "solution_id": solution_id,
            }),
            Self::DeleteSolution { solution_id } => serde_json::json!({
                "message": "Solution deleted",
                "solution_id": solution_id,
            }),
        }
    }

    /// Wraps the event in a timestamped wire frame.
    #[must_use]
    pub fn frame(&self) -> EventFrame {
        EventFrame {
            event: self.event_type_str().to_string(),
            timestamp: Utc::now(),
            payload: self.payload(),
        }
    }
}

/// Wire envelope: one JSON document per delivered message.
///
/// ```json
/// {"event": "new_solution", "timestamp": "2024-01-01T00:00:00Z",
///  "payload": {"message": "New solution added", "solution_id": 7}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event type discriminator.
    pub event: String,
    /// Publish time.
    pub timestamp: DateTime<Utc>,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        assert_eq!(LiveEvent::NewSolution { solution_id: 1 }.event_type_str(), "new_solution");
        assert_eq!(
            LiveEvent::UpdateSolution { solution_id: 1 }.event_type_str(),
            "update_solution"
        );
        assert_eq!(
            LiveEvent::DeleteSolution { solution_id: 1 }.event_type_str(),
            "delete_solution"
        );
    }

    #[test]
    fn frame_serializes_event_and_payload() {
        let frame = LiveEvent::NewSolution { solution_id: 7 }.frame();
        let Ok(json) = serde_json::to_value(&frame) else {
            panic!("frame should serialize");
        };
        assert_eq!(json["event"], "new_solution");
        assert_eq!(json["payload"]["solution_id"], 7);
        assert!(json["timestamp"].is_string());
    }
}
