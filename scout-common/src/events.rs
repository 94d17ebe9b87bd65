//! Event types for the Scout event system
//!
//! Provides shared event definitions and the EventBus used by all Scout modules.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scout event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoutEvent {
    /// A search session started collecting
    ///
    /// Triggers:
    /// - SSE: Show search-in-progress indicator
    SearchStarted {
        /// Session UUID
        session_id: Uuid,
        /// Raw query text as submitted
        query: String,
        /// When the session started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session state machine transition
    SearchStateChanged {
        /// Session UUID
        session_id: Uuid,
        /// State before transition
        old_state: String,
        /// State after transition
        new_state: String,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One source finished its collection round
    ///
    /// Triggers:
    /// - SSE: Update per-source progress row
    SourceCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Platform identifier ("github", "stackoverflow", ...)
        platform: String,
        /// Candidates accepted into the merge pool from this round
        accepted: usize,
        /// Candidates rejected by validation or missing identity
        rejected: usize,
        /// Wall-clock time the source call took
        latency_ms: u64,
        /// Unique candidates in the pool after merging this round
        pool_size: usize,
        /// When the source completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One source failed or timed out
    SourceFailed {
        /// Session UUID
        session_id: Uuid,
        /// Platform identifier
        platform: String,
        /// Human-readable failure description
        error: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Quality evaluation finished for the current pool
    EvaluationCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Candidates at or above the quality threshold
        high_quality: usize,
        /// Minimum required by the guarantee
        required: usize,
        /// Whether the guarantee is currently met
        satisfied: bool,
        /// When the evaluation finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A fallback collection round is starting
    RetryStarted {
        /// Session UUID
        session_id: Uuid,
        /// Strategy name ("broadening", "alternative_sources", "relaxed_criteria")
        strategy: String,
        /// 1-based retry attempt number
        attempt: u32,
        /// When the retry started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search session finished
    ///
    /// Triggers:
    /// - SSE: Render final result set
    SearchCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Total unique candidates returned
        total_candidates: usize,
        /// Whether the quality guarantee was met without degrading
        guarantee_met: bool,
        /// Total session duration
        duration_ms: u64,
        /// When the session finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search session failed outright
    SearchFailed {
        /// Session UUID
        session_id: Uuid,
        /// Human-readable failure description
        error: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search session cancelled by the user
    SearchCancelled {
        /// Session UUID
        session_id: Uuid,
        /// When the cancellation took effect
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScoutEvent {
    /// Returns the event type name used as the SSE event name
    pub fn event_type(&self) -> &str {
        match self {
            ScoutEvent::SearchStarted { .. } => "SearchStarted",
            ScoutEvent::SearchStateChanged { .. } => "SearchStateChanged",
            ScoutEvent::SourceCompleted { .. } => "SourceCompleted",
            ScoutEvent::SourceFailed { .. } => "SourceFailed",
            ScoutEvent::EvaluationCompleted { .. } => "EvaluationCompleted",
            ScoutEvent::RetryStarted { .. } => "RetryStarted",
            ScoutEvent::SearchCompleted { .. } => "SearchCompleted",
            ScoutEvent::SearchFailed { .. } => "SearchFailed",
            ScoutEvent::SearchCancelled { .. } => "SearchCancelled",
        }
    }

    /// Returns the session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ScoutEvent::SearchStarted { session_id, .. }
            | ScoutEvent::SearchStateChanged { session_id, .. }
            | ScoutEvent::SourceCompleted { session_id, .. }
            | ScoutEvent::SourceFailed { session_id, .. }
            | ScoutEvent::EvaluationCompleted { session_id, .. }
            | ScoutEvent::RetryStarted { session_id, .. }
            | ScoutEvent::SearchCompleted { session_id, .. }
            | ScoutEvent::SearchFailed { session_id, .. }
            | ScoutEvent::SearchCancelled { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast-based event bus shared by all components of a module
///
/// Wraps `tokio::sync::broadcast` so emitters never block and slow
/// subscribers miss events rather than stalling the pipeline.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScoutEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScoutEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScoutEvent,
    ) -> Result<usize, broadcast::error::SendError<ScoutEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress updates are fine to drop when no UI is connected.
    pub fn emit_lossy(&self, event: ScoutEvent) {
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

    fn sample_event() -> ScoutEvent {
        ScoutEvent::SearchStarted {
            session_id: Uuid::new_v4(),
            query: "senior rust developer".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_event_serialization_includes_type_tag() {
        let event = sample_event();
        let json = serde_json::to_string(&event).expect("event serialization should succeed");
        assert!(json.contains("\"type\":\"SearchStarted\""));
        assert!(json.contains("\"query\":\"senior rust developer\""));

        let deserialized: ScoutEvent =
            serde_json::from_str(&json).expect("event deserialization should succeed");
        assert_eq!(deserialized.event_type(), "SearchStarted");
    }

    #[test]
    fn test_event_type_matches_variant_name() {
        let session_id = Uuid::new_v4();
        let event = ScoutEvent::SourceCompleted {
            session_id,
            platform: "github".to_string(),
            accepted: 12,
            rejected: 3,
            latency_ms: 2100,
            pool_size: 12,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "SourceCompleted");
        assert_eq!(event.session_id(), session_id);
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(sample_event()).expect("one subscriber is listening");

        let received = rx.recv().await.expect("event should arrive");
        assert_eq!(received.event_type(), "SearchStarted");
    }

    #[test]
    fn test_emit_without_subscribers_fails_but_lossy_does_not_panic() {
        let bus = EventBus::new(16);
        assert!(bus.emit(sample_event()).is_err());
        bus.emit_lossy(sample_event());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
