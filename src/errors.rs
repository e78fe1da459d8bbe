//! Error types for promptbake
//!
//! One error enum for the library; the binary wraps it in `anyhow` at the
//! top level.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Main error type for generation sessions, stores and the account backend
#[derive(Error, Debug)]
pub enum BakeError {
    /// State machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// The streaming call failed or the connection dropped mid-read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Generation endpoint answered with a non-success status
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server-sent event framing errors
    #[error("SSE parse error: {0}")]
    Sse(String),

    /// History / favorites store errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Identity lookup errors
    #[error("Identity unavailable: {0}")]
    Identity(String),

    /// Request payload failed schema validation
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Uniqueness conflicts (email, username)
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Action not allowed on the caller's plan
    #[error("{0}")]
    Forbidden(String),

    /// Missing records
    #[error("{0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for promptbake operations
pub type Result<T> = std::result::Result<T, BakeError>;

impl BakeError {
    /// HTTP status an outer web layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            BakeError::Validation(_) => 400,
            BakeError::Unauthorized(_) => 401,
            BakeError::Forbidden(_) => 403,
            BakeError::NotFound(_) => 404,
            BakeError::Conflict(_) => 409,
            BakeError::Api { status, .. } => *status,
            _ => 500,
        }
    }
}

/// Convert anyhow errors to BakeError
impl From<anyhow::Error> for BakeError {
    fn from(err: anyhow::Error) -> Self {
        BakeError::Generic(err.to_string())
    }
}

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages recorded for one field
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BakeError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BakeError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = BakeError::InvalidTransition {
            from: "Idle".to_string(),
            to: "(via Chunk)".to_string(),
            reason: "No stream open".to_string(),
        };
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("Chunk"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BakeError::Conflict("Email already in use".into()).status_code(), 409);
        assert_eq!(BakeError::Unauthorized("nope".into()).status_code(), 401);
        assert_eq!(BakeError::NotFound("User not found".into()).status_code(), 404);
        assert_eq!(BakeError::Validation(ValidationErrors::new()).status_code(), 400);
        assert_eq!(BakeError::Transport("reset".into()).status_code(), 500);
    }

    #[test]
    fn test_validation_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("email", "Please enter a valid email address");
        errors.add("password", "Password must be at least 6 characters");
        errors.add("password", "Passwords don't match");

        assert_eq!(errors.field("password").len(), 2);
        assert!(errors.field("username").is_empty());
        assert!(errors.to_string().contains("email: Please enter a valid email address"));
        assert!(matches!(errors.into_result(), Err(BakeError::Validation(_))));
    }
}
