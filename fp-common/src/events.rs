//! Feed event types and the broadcast bus
//!
//! The server emits a `FeedEvent` after every committed mutation so that
//! connected clients (SSE) can refresh their feed projection.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{LikeAction, TrackId, ViewerId};

/// Events published by fp-server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedEvent {
    /// A play attribution was processed by the ledger
    PlayRecorded {
        track_id: TrackId,
        viewer_id: ViewerId,
        /// False when the play fell inside the dedup window
        accepted: bool,
        /// True when the increment went to the author bucket
        author_play: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A viewer liked or unliked a track
    LikeToggled {
        track_id: TrackId,
        viewer_id: ViewerId,
        action: LikeAction,
        like_count: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A resume offset was stored
    PositionSaved {
        track_id: TrackId,
        viewer_id: ViewerId,
        last_position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FeedEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::PlayRecorded { .. } => "PlayRecorded",
            FeedEvent::LikeToggled { .. } => "LikeToggled",
            FeedEvent::PositionSaved { .. } => "PositionSaved",
        }
    }
}

/// One-to-many event broadcasting
///
/// Lagging subscribers lose the oldest events; emitters never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn play_event() -> FeedEvent {
        FeedEvent::PlayRecorded {
            track_id: Uuid::new_v4(),
            viewer_id: Uuid::new_v4(),
            accepted: true,
            author_play: false,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(play_event());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let event = play_event();
        bus.emit_lossy(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(play_event()).unwrap();
        assert_eq!(json["type"], "PlayRecorded");
        assert_eq!(json["accepted"], true);
        assert_eq!(play_event().event_type(), "PlayRecorded");
    }
}
