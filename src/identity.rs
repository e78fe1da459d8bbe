//! Who owns a generation
//!
//! Sessions ask the provider at save time, so a sign-out between start and
//! finish surfaces as a persistence failure rather than a mis-attributed row.

use crate::errors::{BakeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Signed-in user as seen by the generation surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub owner_id: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current user; `BakeError::Identity` when nobody is signed in
    async fn current(&self) -> Result<Identity>;
}

/// Fixed identity, typically taken from the config file
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: Option<Identity>,
}

impl StaticIdentity {
    pub fn new(owner_id: impl Into<String>, email: impl Into<String>) -> Self {
        let owner_id = owner_id.into();
        let email = email.into();
        let identity = if owner_id.trim().is_empty() {
            None
        } else {
            Some(Identity { owner_id, email })
        };
        Self { identity }
    }

    /// Nobody signed in
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> Result<Identity> {
        self.identity
            .clone()
            .ok_or_else(|| BakeError::Identity("no signed-in user".to_string()))
    }
}
