//! Generation module
//!
//! Prompt templates, conversation context, the session state machine and
//! the streaming session that ties them to a transport and the stores.

pub mod context;
pub mod prompt;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use context::ConversationContext;
pub use prompt::{builtin_templates, find_template, PromptTemplate, TemplateField};
pub use session::{
    FinishReason, GenerationSession, PersistStatus, SessionOutcome, SessionPolicy, StopHandle,
    StreamingGenerationSession,
};
pub use state::{SessionEvent, SessionState};
