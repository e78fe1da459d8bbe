//! promptbake - streaming content generation
//!
//! Fills a prompt template, streams the completion from a chat-completions
//! endpoint and saves every finished run to history exactly once.
//!
//! # Architecture
//!
//! - **generation**: templates, conversation context, session state machine
//!   and the streaming session driver
//! - **streaming**: HTTP transport, SSE framing, incremental UTF-8 decoding
//! - **store**: history/favorites persistence and the account store
//! - **accounts**: registration, sign-in, membership and fitness tracking
//! - **cli**: argument parsing and TOML configuration

pub mod errors;
pub mod types;

pub mod events;
pub mod export;
pub mod generation;
pub mod identity;
pub mod streaming;

pub mod accounts;
pub mod store;

pub mod cli;

// Re-export commonly used types
pub use errors::{BakeError, Result};
pub use generation::{FinishReason, SessionOutcome, StreamingGenerationSession};
