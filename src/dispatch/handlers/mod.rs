//! Built-in Push Handlers
//!
//! Provides the handlers the broker ships with:
//! - Log: accepts and logs every push
//! - Webhook: forwards pushes to an external delivery service

pub mod log;
pub mod webhook;

pub use self::log::*;
pub use webhook::*;

use crate::dispatch::handler::{HandlerRegistry, PushHandler};
use crate::error::{Error, Result};
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// Handler Spec
// =============================================================================

/// Which built-in handler to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    Log,
    Webhook { url: String },
}

/// A `type=kind[:arg]` handler binding, e.g. `fcm=webhook:https://relay/fcm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    pub push_type: String,
    pub kind: HandlerKind,
}

impl FromStr for HandlerSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (push_type, handler) = s
            .split_once('=')
            .ok_or_else(|| Error::Configuration(format!("expected type=handler, got: {}", s)))?;

        let push_type = push_type.trim();
        if push_type.is_empty() {
            return Err(Error::Configuration(format!("missing push type in: {}", s)));
        }

        let (name, arg) = match handler.trim().split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (handler.trim(), None),
        };

        let kind = match (name.to_lowercase().as_str(), arg) {
            ("log", None) => HandlerKind::Log,
            ("webhook", Some(url)) if !url.is_empty() => HandlerKind::Webhook {
                url: url.to_string(),
            },
            ("webhook", _) => {
                return Err(Error::Configuration(format!(
                    "webhook handler needs a URL: {}",
                    s
                )))
            }
            _ => {
                return Err(Error::Configuration(format!(
                    "unknown handler '{}'. Use 'log' or 'webhook:<url>'",
                    handler
                )))
            }
        };

        Ok(Self {
            push_type: push_type.to_string(),
            kind,
        })
    }
}

// =============================================================================
// Handler Factory
// =============================================================================

/// Factory for built-in handlers
pub struct HandlerFactory;

impl HandlerFactory {
    /// Create a handler from its kind
    pub fn create(kind: &HandlerKind, webhook: &WebhookConfig) -> Result<Arc<dyn PushHandler>> {
        match kind {
            HandlerKind::Log => Ok(Arc::new(LogHandler)),
            HandlerKind::Webhook { url } => Ok(Arc::new(WebhookHandler::new(url, webhook)?)),
        }
    }

    /// Build a registry from handler specs
    pub fn build_registry(specs: &[HandlerSpec], webhook: &WebhookConfig) -> Result<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        for spec in specs {
            registry.register(spec.push_type.clone(), Self::create(&spec.kind, webhook)?)?;
        }
        Ok(registry)
    }
}
