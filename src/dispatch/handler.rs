//! Push Handler Port
//!
//! Boundary between the dispatch engine and the collaborators that actually
//! deliver pushes. Handlers are registered per registration type at startup.

use crate::error::{Error, Result};
use crate::registry::Registration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Dispatch Context
// =============================================================================

/// What triggered a push, when it came from a messaging collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushContext {
    /// Sender of the triggering stanza
    pub origin: Option<String>,
    /// Raw triggering stanza
    pub stanza: Option<String>,
}

impl PushContext {
    /// Context for a stanza-triggered push
    pub fn stanza(origin: impl Into<String>, stanza: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            stanza: Some(stanza.into()),
        }
    }

    /// Check if a stanza triggered this push
    pub fn is_stanza_triggered(&self) -> bool {
        self.stanza.is_some()
    }
}

/// A handler's report that it could not deliver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Human-readable reason, when the handler has one
    pub detail: Option<String>,
}

impl DeliveryFailure {
    /// Failure with a reason
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
        }
    }

    /// Failure without a reason
    pub fn unspecified() -> Self {
        Self::default()
    }
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}", detail),
            None => write!(f, "delivery failed"),
        }
    }
}

/// Outcome of a single delivery attempt
pub type DeliveryResult = std::result::Result<(), DeliveryFailure>;

// =============================================================================
// Push Handler Port
// =============================================================================

/// Delivers pushes for one registration type
#[async_trait]
pub trait PushHandler: Send + Sync {
    /// Handler kind, for logs
    fn kind(&self) -> &'static str;

    /// Deliver a push for a registration
    async fn deliver(&self, record: &Registration, context: &PushContext) -> DeliveryResult;
}

// =============================================================================
// Handler Registry
// =============================================================================

/// Registration type -> handler mapping, fixed at startup
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PushHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a type
    pub fn register(&mut self, push_type: impl Into<String>, handler: Arc<dyn PushHandler>) -> Result<()> {
        let push_type = push_type.into();
        if push_type.is_empty() {
            return Err(Error::Configuration("push type must not be empty".into()));
        }
        if self.handlers.contains_key(&push_type) {
            return Err(Error::Configuration(format!(
                "duplicate handler for push type: {}",
                push_type
            )));
        }
        self.handlers.insert(push_type, handler);
        Ok(())
    }

    /// Get the handler for a type
    pub fn get(&self, push_type: &str) -> Option<Arc<dyn PushHandler>> {
        self.handlers.get(push_type).cloned()
    }

    /// Registered types, sorted
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.types())
            .finish()
    }
}
