//! Chat-completions streaming client
//!
//! Provides real-time text streaming from an OpenAI-compatible endpoint:
//! - HTTP/1.1 streaming via reqwest
//! - Endpoint: POST {base_url}/chat/completions with `stream: true`
//! - Body: server-sent events, or plain text for `StreamFormat::Text`
//!
//! Only connecting is bounded by a timeout; reading the body is not, the
//! user stops a generation explicitly.

use crate::errors::{BakeError, Result};
use crate::streaming::parser::content_stream;
use crate::streaming::{ChunkStream, GenerationRequest, GenerationTransport};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-16k";

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the response body encodes the generated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// `data:` frames carrying `choices[].delta.content`
    #[default]
    Sse,

    /// Raw UTF-8 text, passed through byte for byte
    Text,
}

/// Chat-completions streaming client
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    format: StreamFormat,
}

impl ChatCompletionsClient {
    /// Create client with default settings and no credential
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_API_URL, None, StreamFormat::Sse, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create client with custom configuration
    pub fn with_config(
        base_url: &str,
        api_key: Option<String>,
        format: StreamFormat,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(BakeError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            format,
        })
    }

    /// List models the endpoint offers
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BakeError::Transport(format!("Failed to list models: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BakeError::Api { status, body });
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| BakeError::Transport(format!("Failed to parse models: {}", e)))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get response format
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Whether a credential will be sent
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl GenerationTransport for ChatCompletionsClient {
    async fn open(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| BakeError::Transport(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BakeError::Api { status, body });
        }

        tracing::debug!(url = %url, format = ?self.format, "generation stream opened");

        let bytes: ChunkStream = Box::pin(
            response
                .bytes_stream()
                .map(|result| result.map_err(|e| BakeError::Transport(e.to_string()))),
        );

        let stream: ChunkStream = match self.format {
            StreamFormat::Sse => Box::pin(content_stream(bytes)),
            StreamFormat::Text => bytes,
        };

        Ok(stream)
    }
}

/// Chat-completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}
