//! Push Broker
//!
//! Wires the registration store, the registration protocol and the dispatch
//! engine together, and renders every outcome as the plain-text `OK`/`ERROR`
//! reply shared by the HTTP API and the messaging entry points.

use crate::dispatch::{DispatchEngine, HandlerRegistry, PushContext};
use crate::error::{Error, ReplyClass};
use crate::protocol::{RegisterRequest, RegistrationService, UnregisterTokenRequest};
use crate::registry::{RegistrationStore, Registration};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Largest request body the host accepts, whatever is configured
pub const HOST_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

const NODE_NOT_FOUND: &str = "Node not found!";
const NODE_OR_SECRET_NOT_FOUND: &str = "Node or secret not found!";
const BAD_REQUEST: &str = "Bad Request";
const INTERNAL_ERROR: &str = "Internal Server Error";

// =============================================================================
// Broker Configuration
// =============================================================================

/// Configuration for the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Expose the `/v1/settings` debug dump
    pub debug_settings: bool,
    /// Request body limit in bytes (capped to [`HOST_MAX_BODY_SIZE`])
    pub body_size_limit: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            debug_settings: false,
            body_size_limit: 4096,
        }
    }
}

impl BrokerConfig {
    /// Body limit actually enforced
    pub fn effective_body_limit(&self) -> usize {
        self.body_size_limit.min(HOST_MAX_BODY_SIZE)
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Plain-text protocol reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` followed by one line per value
    Ok(Vec<String>),
    /// `ERROR` followed by a message
    Error { class: ReplyClass, message: String },
}

impl Reply {
    fn failure(err: &Error, not_found: &str) -> Self {
        let class = err.reply_class();
        let message = match class {
            ReplyClass::BadRequest => BAD_REQUEST,
            ReplyClass::NotFound => not_found,
            ReplyClass::Internal => INTERNAL_ERROR,
        };
        Reply::Error {
            class,
            message: message.to_string(),
        }
    }

    /// Check if this is an `OK` reply
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }

    /// Error class, if this is an `ERROR` reply
    pub fn class(&self) -> Option<ReplyClass> {
        match self {
            Reply::Ok(_) => None,
            Reply::Error { class, .. } => Some(*class),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok(lines) => {
                write!(f, "OK")?;
                for line in lines {
                    write!(f, "\n{}", line)?;
                }
                Ok(())
            }
            Reply::Error { message, .. } => write!(f, "ERROR\n{}", message),
        }
    }
}

// =============================================================================
// Broker
// =============================================================================

/// The push broker
pub struct Broker {
    config: BrokerConfig,
    store: Arc<RegistrationStore>,
    protocol: RegistrationService,
    dispatch: DispatchEngine,
}

impl Broker {
    /// Create a broker over a store and a handler registry
    pub fn new(
        config: BrokerConfig,
        store: Arc<RegistrationStore>,
        handlers: HandlerRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            protocol: RegistrationService::new(store.clone()),
            dispatch: DispatchEngine::new(store.clone(), Arc::new(handlers)),
            store,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Get the registration store
    pub fn store(&self) -> &Arc<RegistrationStore> {
        &self.store
    }

    /// Get the dispatch engine
    pub fn dispatch(&self) -> &DispatchEngine {
        &self.dispatch
    }

    /// Register a node: `OK\n<node>\n<secret>`
    pub async fn register(&self, node: &str, push_type: &str, token: &str) -> Reply {
        let request = RegisterRequest {
            node: node.to_string(),
            push_type: push_type.to_string(),
            token: token.to_string(),
        };

        match self.protocol.register(request).await {
            Ok(receipt) => Reply::Ok(vec![receipt.node, receipt.secret]),
            Err(e) => {
                log_failure("Register", node, &e);
                Reply::failure(&e, NODE_NOT_FOUND)
            }
        }
    }

    /// Unregister a node: `OK\n<node>\n<secret>`
    pub async fn unregister(&self, node: &str, push_type: &str) -> Reply {
        match self.protocol.unregister(node, push_type).await {
            Ok(receipt) => Reply::Ok(vec![receipt.node, receipt.secret]),
            Err(e) => {
                log_failure("Unregister", node, &e);
                Reply::failure(&e, NODE_NOT_FOUND)
            }
        }
    }

    /// Handle an `unregister-push-token` message
    pub async fn unregister_push_token(&self, request: UnregisterTokenRequest) -> Reply {
        match self.protocol.unregister_by_token(request).await {
            Ok(receipt) => Reply::Ok(vec![receipt.node, receipt.secret]),
            Err(e) => {
                log_failure("Unregister by token", "-", &e);
                Reply::failure(&e, NODE_NOT_FOUND)
            }
        }
    }

    /// Trigger a push: `OK\n<node>`
    pub async fn push(&self, node: &str, secret: &str, context: PushContext) -> Reply {
        match self.dispatch.push(node, secret, context).await {
            Ok(receipt) => Reply::Ok(vec![receipt.node]),
            Err(e) => {
                // Handler failures are already logged by the engine
                if !e.is_dispatch_failure() {
                    log_failure("Push", node, &e);
                }
                Reply::failure(&e, NODE_OR_SECRET_NOT_FOUND)
            }
        }
    }

    /// Trigger a push on behalf of a messaging collaborator
    pub async fn push_from_stanza(
        &self,
        node: &str,
        secret: &str,
        origin: &str,
        stanza: &str,
    ) -> Reply {
        self.push(node, secret, PushContext::stanza(origin, stanza)).await
    }

    /// All registered nodes, sorted
    pub async fn nodes(&self) -> Vec<String> {
        let mut nodes = self.store.list().await;
        nodes.sort();
        nodes
    }

    /// Stored registration for a node
    pub async fn settings(&self, node: &str) -> Option<Registration> {
        self.store.get(node).await
    }
}

fn log_failure(operation: &str, node: &str, err: &Error) {
    match err.reply_class() {
        ReplyClass::BadRequest => debug!("{} rejected for node {}: {}", operation, node, err),
        ReplyClass::NotFound => warn!("{} failed for node {}: {}", operation, node, err),
        ReplyClass::Internal => error!("{} failed for node {}: {}", operation, node, err),
    }
}
