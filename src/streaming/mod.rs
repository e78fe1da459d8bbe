//! Streaming transport module
//!
//! Provides the chat-completions client, the incremental SSE parser and the
//! incremental UTF-8 decoder used by generation sessions.

pub mod client;
pub mod decoder;
pub mod parser;

use crate::errors::Result;
use crate::types::ChatMessage;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

// Re-export commonly used types
pub use client::{ChatCompletionsClient, StreamFormat, DEFAULT_API_URL, DEFAULT_MODEL};
pub use decoder::Utf8Decoder;
pub use parser::{SseParser, MAX_BUFFER_SIZE};

/// Stream of UTF-8 text fragments, cut at arbitrary byte offsets
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Chat-style generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Streaming text-generation endpoint
///
/// Dropping the returned stream aborts the underlying call.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn open(&self, request: &GenerationRequest) -> Result<ChunkStream>;
}
