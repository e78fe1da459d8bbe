//! Streaming generation session
//!
//! `GenerationSession` holds one run's state: buffer, decoder, cancellation
//! token and state machine. `StreamingGenerationSession` is the surface that
//! owns the conversation, drives a fresh `GenerationSession` per `run()` and
//! persists each finished run exactly once.
//!
//! Cancellation is cooperative. The consumption loop checks the token before
//! taking the next chunk, and leaving the loop drops the response stream,
//! which closes the connection. Text appended before the stop is kept.

use crate::errors::{BakeError, Result};
use crate::events::{EventBus, GenerationEvent};
use crate::export::strip_markup;
use crate::generation::context::ConversationContext;
use crate::generation::prompt::PromptTemplate;
use crate::generation::state::{SessionEvent, SessionState};
use crate::identity::IdentityProvider;
use crate::store::{FavoriteStore, HistoryStore, RecordId};
use crate::streaming::{GenerationRequest, GenerationTransport, Utf8Decoder, DEFAULT_MODEL};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a session reached `Finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The stream ended on its own
    Completed,

    /// Stopped by the user
    Cancelled,

    /// Opening or reading the stream failed
    TransportError,
}

impl FinishReason {
    fn event(self) -> SessionEvent {
        match self {
            FinishReason::Completed => SessionEvent::StreamEnded,
            FinishReason::Cancelled => SessionEvent::Cancel,
            FinishReason::TransportError => SessionEvent::TransportError,
        }
    }
}

/// Single run: accumulated text and lifecycle of one request
#[derive(Debug)]
pub struct GenerationSession {
    id: Uuid,
    state: SessionState,
    buffer: String,
    decoder: Utf8Decoder,
    cancel: CancellationToken,
    finish_reason: Option<FinishReason>,
    error: Option<String>,
    chunks: usize,
}

impl GenerationSession {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            buffer: String::new(),
            decoder: Utf8Decoder::new(),
            cancel,
            finish_reason: None,
            error: None,
            chunks: 0,
        }
    }

    /// Idle -> Streaming
    pub fn start(&mut self) -> Result<()> {
        self.state = self.state.transition(SessionEvent::Start)?;
        Ok(())
    }

    /// Decode and append a chunk, returning the whole buffer
    pub fn on_chunk(&mut self, bytes: &[u8]) -> Result<&str> {
        self.state = self.state.transition(SessionEvent::Chunk)?;
        if self.state.is_terminal() {
            // late chunk after finish
            return Ok(&self.buffer);
        }

        let text = self.decoder.decode(bytes);
        self.buffer.push_str(&text);
        self.chunks += 1;
        Ok(&self.buffer)
    }

    /// Record a transport failure for the outcome
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Move to `Finished`; only the first call decides the reason
    ///
    /// A natural end flushes the decoder, so a truncated trailing sequence
    /// shows up as U+FFFD. Stopped or failed runs drop incomplete bytes.
    pub fn on_complete(&mut self, reason: FinishReason) -> Result<&str> {
        if self.state.is_terminal() {
            return Ok(&self.buffer);
        }

        self.state = self.state.transition(reason.event())?;
        if reason == FinishReason::Completed {
            let tail = self.decoder.finish();
            self.buffer.push_str(&tail);
        }
        self.finish_reason = Some(reason);
        Ok(&self.buffer)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }
}

/// Stop control shared with whoever renders the Stop button
///
/// Each run arms a fresh token; `cancel()` targets the run in flight and is
/// a no-op once it has finished.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        // the guarded value is a plain token, a poisoned lock is still usable
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn arm(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        *self.lock() = fresh.clone();
        fresh
    }

    /// Stop the current run; idempotent
    pub fn cancel(&self) {
        self.lock().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_cancelled()
    }
}

/// Persistence behavior of finished runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Save runs that produced no text (e.g. stopped before the first chunk)
    pub persist_empty_results: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            persist_empty_results: true,
        }
    }
}

/// What happened to a finished run's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    Saved(RecordId),
    Failed(String),
    Skipped,
}

impl PersistStatus {
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            PersistStatus::Saved(id) => Some(*id),
            _ => None,
        }
    }
}

/// Result of one `run()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub reason: FinishReason,
    pub text: String,
    pub persist: PersistStatus,

    /// Transport failure message, if any
    pub error: Option<String>,
}

impl SessionOutcome {
    pub fn record_id(&self) -> Option<RecordId> {
        self.persist.record_id()
    }
}

/// Generation surface: prompt form, conversation and run driver
pub struct StreamingGenerationSession {
    transport: Arc<dyn GenerationTransport>,
    history: Arc<dyn HistoryStore>,
    identity: Arc<dyn IdentityProvider>,
    events: EventBus,
    template: PromptTemplate,
    inputs: Vec<String>,
    context: ConversationContext,
    model: String,
    policy: SessionPolicy,
    stop: StopHandle,
    last_outcome: Option<SessionOutcome>,
}

impl StreamingGenerationSession {
    pub fn new(
        transport: Arc<dyn GenerationTransport>,
        history: Arc<dyn HistoryStore>,
        identity: Arc<dyn IdentityProvider>,
        template: PromptTemplate,
    ) -> Self {
        let context = ConversationContext::with_instructions(template.instructions.clone());
        Self {
            transport,
            history,
            identity,
            events: EventBus::default(),
            template,
            inputs: Vec::new(),
            context,
            model: DEFAULT_MODEL.to_string(),
            policy: SessionPolicy::default(),
            stop: StopHandle::new(),
            last_outcome: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Fill the prompt form; rebuilds the context and drops earlier output
    pub fn set_inputs(&mut self, inputs: Vec<String>) -> Result<()> {
        self.context = ConversationContext::build(&self.template, &inputs)?;
        self.inputs = inputs;
        Ok(())
    }

    /// Generate (or continue) with the current context
    ///
    /// Always finishes: transport failures and stops end the run with the
    /// text read so far, which is appended to the context and persisted
    /// once. `Err` is reserved for state machine violations.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        let token = self.stop.arm();
        let mut session = GenerationSession::new(token.clone());
        session.start()?;

        let session_id = session.id();
        self.events.emit(GenerationEvent::Started { session_id });
        info!(
            "Generation {} started ({} messages, ~{} tokens)",
            session_id,
            self.context.len(),
            self.context.estimate_tokens()
        );

        let request = GenerationRequest {
            model: self.model.clone(),
            messages: self.context.messages().to_vec(),
        };
        let reason = self.consume(&mut session, &request, &token).await;

        let text = session.on_complete(reason)?.to_string();
        self.events.emit(GenerationEvent::Finished {
            session_id,
            reason,
            chars: text.chars().count(),
        });
        info!(
            "Generation {} finished: {:?} after {} chunks",
            session_id,
            reason,
            session.chunk_count()
        );

        self.context.append_assistant(text.clone());
        let persist = self.persist(session_id, &text).await;

        let outcome = SessionOutcome {
            session_id,
            reason,
            text,
            persist,
            error: session.error().map(str::to_string),
        };
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    async fn consume(
        &self,
        session: &mut GenerationSession,
        request: &GenerationRequest,
        token: &CancellationToken,
    ) -> FinishReason {
        let session_id = session.id();
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            opened = self.transport.open(request) => Some(opened),
        };

        let mut stream = match opened {
            None => return FinishReason::Cancelled,
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                warn!("Generation {} failed to open stream: {}", session_id, e);
                session.record_error(e.to_string());
                return FinishReason::TransportError;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                item = stream.next() => Some(item),
            };

            match next {
                None => {
                    debug!("Generation {} stopped by user", session_id);
                    return FinishReason::Cancelled;
                }
                Some(None) => return FinishReason::Completed,
                Some(Some(Ok(bytes))) => {
                    debug!("Generation {}: chunk of {} bytes", session_id, bytes.len());
                    match session.on_chunk(&bytes) {
                        Ok(text) => self.events.emit(GenerationEvent::TextUpdated {
                            session_id,
                            text: text.to_string(),
                        }),
                        Err(e) => {
                            warn!("Generation {} rejected chunk: {}", session_id, e);
                            session.record_error(e.to_string());
                            return FinishReason::TransportError;
                        }
                    }
                }
                Some(Some(Err(e))) => {
                    warn!("Generation {} stream failed: {}", session_id, e);
                    session.record_error(e.to_string());
                    return FinishReason::TransportError;
                }
            }
        }
    }

    async fn persist(&self, session_id: Uuid, text: &str) -> PersistStatus {
        if text.is_empty() && !self.policy.persist_empty_results {
            debug!("Generation {} produced no text, not saving", session_id);
            self.events.emit(GenerationEvent::SaveSkipped { session_id });
            return PersistStatus::Skipped;
        }

        self.events.emit(GenerationEvent::SaveStarted { session_id });

        let saved = match self.identity.current().await {
            Ok(identity) => {
                let description = self.template.describe(&self.inputs);
                self.history
                    .save(&identity.owner_id, &description, text)
                    .await
            }
            Err(e) => Err(e),
        };

        match saved {
            Ok(record_id) => {
                info!("Generation {} saved as record {}", session_id, record_id);
                self.events.emit(GenerationEvent::Saved {
                    session_id,
                    record_id,
                });
                PersistStatus::Saved(record_id)
            }
            Err(e) => {
                warn!("Failed to save generation {}: {}", session_id, e);
                self.events.emit(GenerationEvent::SaveFailed {
                    session_id,
                    error: e.to_string(),
                });
                PersistStatus::Failed(e.to_string())
            }
        }
    }

    /// Stop the run in flight, if any
    pub fn cancel(&self) {
        self.stop.cancel();
    }

    /// Handle for stopping a run from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn last_outcome(&self) -> Option<&SessionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Last result with markup removed, ready for the clipboard
    pub fn plain_text(&self) -> Option<String> {
        self.last_outcome.as_ref().map(|o| strip_markup(&o.text))
    }

    /// Bookmark the last saved result for the current user
    pub async fn favorite_last(&self, favorites: &dyn FavoriteStore) -> Result<RecordId> {
        let record_id = self
            .last_outcome
            .as_ref()
            .and_then(SessionOutcome::record_id)
            .ok_or_else(|| BakeError::NotFound("No saved generation to favorite".to_string()))?;

        let identity = self.identity.current().await?;
        favorites.add_favorite(record_id, &identity.email).await?;
        info!("Record {} added to favorites of {}", record_id, identity.email);
        Ok(record_id)
    }
}
