//! Dispatch Engine
//!
//! Authenticates push triggers against a node's secret, hands the record to
//! the handler registered for its type and records the outcome.

use crate::dispatch::handler::{DeliveryFailure, DeliveryResult, HandlerRegistry, PushContext};
use crate::error::{Error, Result};
use crate::protocol::secrets_match;
use crate::registry::{RegistrationStore, Registration, RegistryEvent};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Confirmation of a delivered push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    pub node: String,
}

/// Authenticated push dispatcher
pub struct DispatchEngine {
    store: Arc<RegistrationStore>,
    handlers: Arc<HandlerRegistry>,
}

impl DispatchEngine {
    /// Create a new dispatch engine
    pub fn new(store: Arc<RegistrationStore>, handlers: Arc<HandlerRegistry>) -> Self {
        Self { store, handlers }
    }

    /// Get the handler registry
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Push to a node holding `secret`
    ///
    /// An unknown node and a wrong secret produce errors that render
    /// identically at the boundary. Neither touches the store.
    pub async fn push(&self, node: &str, secret: &str, context: PushContext) -> Result<PushReceipt> {
        if node.is_empty() || secret.is_empty() {
            return Err(Error::Validation("push needs node and secret".into()));
        }

        let record = match self.store.get(node).await {
            Some(record) if secrets_match(secret, &record.secret) => record,
            Some(_) => {
                debug!("Rejected push for node {}: secret mismatch", node);
                return Err(Error::Unauthorized {
                    node: node.to_string(),
                });
            }
            None => {
                return Err(Error::NotFound {
                    node: node.to_string(),
                })
            }
        };

        // Handlers run outside the mutation lock
        let handler = self.handlers.get(&record.push_type);
        let outcome: DeliveryResult = match &handler {
            Some(handler) => {
                debug!("Dispatching push for node {} to {} handler", node, handler.kind());
                handler.deliver(&record, &context).await
            }
            None => Err(DeliveryFailure::new(format!(
                "no handler registered for type {}",
                record.push_type
            ))),
        };

        self.record_outcome(&record, &outcome).await?;

        match outcome {
            Ok(()) => {
                info!("Push delivered for node {}", node);
                self.store.emit(RegistryEvent::PushDelivered {
                    node: node.to_string(),
                    push_type: record.push_type,
                });
                Ok(PushReceipt {
                    node: node.to_string(),
                })
            }
            Err(failure) => {
                error!("Push failed for node {}: {}", node, failure);
                self.store.emit(RegistryEvent::PushFailed {
                    node: node.to_string(),
                    push_type: record.push_type.clone(),
                    reason: failure.detail.clone(),
                });
                if handler.is_none() {
                    return Err(Error::HandlerNotFound {
                        push_type: record.push_type,
                    });
                }
                Err(Error::Handler {
                    node: node.to_string(),
                    push_type: record.push_type,
                    detail: failure.to_string(),
                })
            }
        }
    }

    /// Write the delivery outcome onto the current record
    ///
    /// Skipped when the registration was deleted or replaced while the handler
    /// was running, so a finished push never resurrects a node.
    async fn record_outcome(&self, dispatched: &Registration, outcome: &DeliveryResult) -> Result<()> {
        let _guard = self.store.lock().await;

        let mut current = match self.store.get(&dispatched.node).await {
            Some(current) if current.secret == dispatched.secret => current,
            _ => {
                debug!(
                    "Node {} changed during dispatch, not recording outcome",
                    dispatched.node
                );
                return Ok(());
            }
        };

        match outcome {
            Ok(()) => current.record_push_success(),
            Err(failure) => current.record_push_error(failure.detail.clone()),
        }

        let node = current.node.clone();
        self.store.set(&node, Some(current)).await
    }
}
