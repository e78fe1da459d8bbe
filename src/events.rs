//! Event bus for real-time generation updates
//!
//! Provides publisher-subscriber delivery of session events to the front end
//! over a bounded channel. Emission never blocks the consumption loop: when
//! the channel is full the event is dropped, and the next `TextUpdated`
//! carries the whole buffer again.

use crate::generation::session::FinishReason;
use crate::store::RecordId;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Generation lifecycle and save-status events
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// A new session switched the surface from input to result mode
    Started { session_id: Uuid },

    /// Buffer republished after a chunk was appended
    TextUpdated { session_id: Uuid, text: String },

    /// Session reached FINISHED
    Finished {
        session_id: Uuid,
        reason: FinishReason,
        chars: usize,
    },

    // Save-status indicator
    SaveStarted { session_id: Uuid },
    Saved { session_id: Uuid, record_id: RecordId },
    SaveFailed { session_id: Uuid, error: String },
    SaveSkipped { session_id: Uuid },
}

/// Event bus for publishing generation events
pub struct EventBus {
    sender: mpsc::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create new event bus with the default bounded channel
    pub fn new() -> (Self, mpsc::Receiver<GenerationEvent>) {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create new event bus with a custom channel capacity
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<GenerationEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (EventBus { sender }, receiver)
    }

    /// Emit an event without waiting for the subscriber
    pub fn emit(&self, event: GenerationEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::trace!("generation event dropped: {}", err);
        }
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        EventBus {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_emission() {
        let (bus, mut receiver) = EventBus::new();
        let session_id = Uuid::new_v4();

        bus.emit(GenerationEvent::Started { session_id });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");

        assert_eq!(event, GenerationEvent::Started { session_id });
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (bus, mut receiver) = EventBus::new();
        let session_id = Uuid::new_v4();

        bus.emit(GenerationEvent::TextUpdated {
            session_id,
            text: "a".into(),
        });
        bus.emit(GenerationEvent::TextUpdated {
            session_id,
            text: "ab".into(),
        });

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert!(matches!(first, GenerationEvent::TextUpdated { text, .. } if text == "a"));
        assert!(matches!(second, GenerationEvent::TextUpdated { text, .. } if text == "ab"));
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (bus, mut receiver) = EventBus::with_capacity(2);
        let session_id = Uuid::new_v4();

        for _ in 0..5 {
            bus.emit(GenerationEvent::SaveStarted { session_id });
        }

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_without_subscriber_is_harmless() {
        let bus = EventBus::default();
        bus.emit(GenerationEvent::SaveSkipped {
            session_id: Uuid::new_v4(),
        });
    }
}
