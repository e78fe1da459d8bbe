//! Generation session state machine
//!
//! ```text
//! Idle      --Start-->           Streaming
//! Streaming --Chunk-->           Streaming
//! Streaming --StreamEnded-->     Finished
//! Streaming --Cancel-->          Finished
//! Streaming --TransportError-->  Finished
//! Idle      --Cancel-->          Idle      (nothing in flight)
//! Finished  --*-->               Finished  (terminal)
//! ```
//!
//! There is no retry state: a failed or stopped generation is continued by
//! starting a new session.

use crate::errors::{BakeError, Result};
use serde::{Deserialize, Serialize};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, no request issued yet
    Idle,

    /// Request issued, consuming chunks
    Streaming,

    /// Terminal: completed, cancelled or failed
    Finished,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Chunk,
    StreamEnded,
    Cancel,
    TransportError,
}

impl SessionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished)
    }

    /// Attempt state transition with validation
    pub fn transition(&self, event: SessionEvent) -> Result<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        let next_state = match (self, event) {
            (Idle, Start) => Streaming,
            (Idle, Cancel) => Idle,

            (Streaming, Chunk) => Streaming,
            (Streaming, StreamEnded) => Finished,
            (Streaming, Cancel) => Finished,
            (Streaming, TransportError) => Finished,

            (Finished, _) => Finished,

            (from, event) => {
                return Err(BakeError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Streaming => "Streaming",
            SessionState::Finished => "Finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SessionState::Idle.transition(SessionEvent::Start).unwrap();
        assert_eq!(state, SessionState::Streaming);

        let state = state.transition(SessionEvent::Chunk).unwrap();
        assert_eq!(state, SessionState::Streaming);

        let state = state.transition(SessionEvent::StreamEnded).unwrap();
        assert_eq!(state, SessionState::Finished);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_every_termination_reaches_finished() {
        for event in [
            SessionEvent::StreamEnded,
            SessionEvent::Cancel,
            SessionEvent::TransportError,
        ] {
            assert_eq!(
                SessionState::Streaming.transition(event).unwrap(),
                SessionState::Finished
            );
        }
    }

    #[test]
    fn test_finished_absorbs_everything() {
        for event in [
            SessionEvent::Start,
            SessionEvent::Chunk,
            SessionEvent::Cancel,
            SessionEvent::Cancel,
        ] {
            assert_eq!(
                SessionState::Finished.transition(event).unwrap(),
                SessionState::Finished
            );
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(SessionState::Idle.transition(SessionEvent::Chunk).is_err());
        assert!(SessionState::Idle.transition(SessionEvent::StreamEnded).is_err());
        assert!(SessionState::Streaming.transition(SessionEvent::Start).is_err());
    }

    #[test]
    fn test_cancel_while_idle_is_noop() {
        assert_eq!(
            SessionState::Idle.transition(SessionEvent::Cancel).unwrap(),
            SessionState::Idle
        );
    }
}
