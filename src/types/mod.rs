//! Type definitions module
//!
//! Chat message types exchanged with the generation endpoint.

pub mod messages;

// Re-export commonly used types
pub use messages::{ChatMessage, Role};
