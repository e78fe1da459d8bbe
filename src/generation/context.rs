//! Conversation context sent with every generation request
//!
//! The first message is always the template's system instructions. Editing
//! the form rebuilds the context from scratch; finishing a generation only
//! appends to it, so "Continue" carries the earlier output as history.

use crate::errors::Result;
use crate::generation::prompt::PromptTemplate;
use crate::types::{ChatMessage, Role};

/// Ordered, role-tagged conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    /// Fresh context: system instructions followed by the rendered prompt
    pub fn build(template: &PromptTemplate, inputs: &[String]) -> Result<Self> {
        let prompt = template.render(inputs)?;
        Ok(Self {
            messages: vec![
                ChatMessage::system(template.instructions.clone()),
                ChatMessage::user(prompt),
            ],
        })
    }

    /// Context holding only the system instructions
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(instructions)],
        }
    }

    /// Append a finished generation
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent assistant output, if any
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Rough token estimate of the whole request
    pub fn estimate_tokens(&self) -> usize {
        self.messages.iter().map(ChatMessage::estimate_tokens).sum()
    }
}
