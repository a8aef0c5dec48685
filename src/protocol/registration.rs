//! Registration Protocol
//!
//! Validates and applies register, unregister and unregister-by-token
//! requests against the [`RegistrationStore`].

use crate::error::{Error, Result};
use crate::protocol::secret::generate_secret;
use crate::registry::{RegistrationStore, Registration, RegistryEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Request/Receipt Types
// =============================================================================

/// Request to register a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node: String,
    #[serde(rename = "type")]
    pub push_type: String,
    pub token: String,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub node: String,
    pub secret: String,
    /// True when an existing identical registration was renewed
    pub renewed: bool,
}

/// Request to unregister by token, as sent by a messaging collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterTokenRequest {
    pub token: String,
    #[serde(rename = "type")]
    pub push_type: String,
    /// When the delete was issued
    pub timestamp: DateTime<Utc>,
}

/// Confirmation of a deleted registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterReceipt {
    pub node: String,
    pub secret: String,
}

// =============================================================================
// Registration Service
// =============================================================================

/// Applies the registration protocol
pub struct RegistrationService {
    store: Arc<RegistrationStore>,
}

impl RegistrationService {
    /// Create a new registration service
    pub fn new(store: Arc<RegistrationStore>) -> Self {
        Self { store }
    }

    /// Register a node, or renew an identical registration
    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationReceipt> {
        require("node", &request.node)?;
        require("type", &request.push_type)?;
        require("token", &request.token)?;

        let _guard = self.store.lock().await;

        if let Some(mut existing) = self.store.get(&request.node).await {
            if existing.matches(&request.push_type, &request.token) {
                existing.renew();
                let secret = existing.secret.clone();
                self.store.set(&request.node, Some(existing)).await?;

                debug!("Renewed registration for node {}", request.node);
                self.store.emit(RegistryEvent::Renewed {
                    node: request.node.clone(),
                    push_type: request.push_type,
                });

                return Ok(RegistrationReceipt {
                    node: request.node,
                    secret,
                    renewed: true,
                });
            }

            info!(
                "Node {} re-registered with a different binding ({} -> {}), issuing new secret",
                request.node, existing.push_type, request.push_type
            );
        }

        let secret = generate_secret(&request.push_type, &request.token, &request.node)?;
        let record = Registration::new(
            request.node.clone(),
            request.push_type.clone(),
            request.token,
            secret.clone(),
        );
        self.store.set(&request.node, Some(record)).await?;

        info!("Registered node {} for {} pushes", request.node, request.push_type);
        self.store.emit(RegistryEvent::Registered {
            node: request.node.clone(),
            push_type: request.push_type,
        });

        Ok(RegistrationReceipt {
            node: request.node,
            secret,
            renewed: false,
        })
    }

    /// Unregister a node of the given type
    pub async fn unregister(&self, node: &str, push_type: &str) -> Result<UnregisterReceipt> {
        require("node", node)?;
        require("type", push_type)?;

        let _guard = self.store.lock().await;

        let record = match self.store.get(node).await {
            Some(record) if record.push_type == push_type => record,
            _ => {
                return Err(Error::NotFound {
                    node: node.to_string(),
                })
            }
        };

        self.delete(record, false).await
    }

    /// Unregister whichever node holds `token`, unless it renewed since
    /// `timestamp`
    pub async fn unregister_by_token(
        &self,
        request: UnregisterTokenRequest,
    ) -> Result<UnregisterReceipt> {
        require("token", &request.token)?;
        require("type", &request.push_type)?;

        let _guard = self.store.lock().await;

        let node = self
            .store
            .token_to_node(&request.token)
            .await
            .ok_or_else(|| Error::NotFound {
                node: "<by token>".to_string(),
            })?;

        // The index may be stale; trust only the record itself
        let record = match self.store.get(&node).await {
            Some(record) if record.matches(&request.push_type, &request.token) => record,
            _ => {
                self.store.index().invalidate(&request.token);
                return Err(Error::NotFound { node });
            }
        };

        let reference = record.reference_time();
        if request.timestamp <= reference {
            warn!(
                "Ignoring stale unregister for node {}: issued {}, last renewed {}",
                node, request.timestamp, reference
            );
            self.store
                .emit(RegistryEvent::StaleUnregisterRejected { node: node.clone() });
            return Err(Error::StaleRequest {
                node,
                requested: request.timestamp.to_rfc3339(),
                reference: reference.to_rfc3339(),
            });
        }

        self.delete(record, true).await
    }

    async fn delete(&self, record: Registration, by_token: bool) -> Result<UnregisterReceipt> {
        self.store.set(&record.node, None).await?;

        info!("Unregistered node {}", record.node);
        self.store.emit(RegistryEvent::Unregistered {
            node: record.node.clone(),
            push_type: record.push_type,
            by_token,
        });

        Ok(UnregisterReceipt {
            node: record.node,
            secret: record.secret,
        })
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("missing field: {}", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStorage;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn service() -> (RegistrationService, Arc<RegistrationStore>) {
        let store = RegistrationStore::new(Arc::new(MemoryStorage::new()));
        (RegistrationService::new(store.clone()), store)
    }

    fn request(node: &str, push_type: &str, token: &str) -> RegisterRequest {
        RegisterRequest {
            node: node.into(),
            push_type: push_type.into(),
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (service, store) = service();

        let first = service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        assert!(!first.renewed);
        let registered = store.get("nodeA").await.unwrap().registered;

        let second = service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        assert!(second.renewed);
        assert_eq!(first.secret, second.secret);

        let record = store.get("nodeA").await.unwrap();
        assert_eq!(record.registered, registered);
        assert!(record.renewed.is_some());
    }

    #[tokio::test]
    async fn test_register_with_new_token_overwrites() {
        let (service, store) = service();

        let first = service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        let second = service.register(request("nodeA", "fcm", "tok2")).await.unwrap();

        assert!(!second.renewed);
        assert_ne!(first.secret, second.secret);

        let record = store.get("nodeA").await.unwrap();
        assert_eq!(record.token, "tok2");
        assert!(record.renewed.is_none());

        // Same token under another type is a new binding too
        let third = service.register(request("nodeA", "apns", "tok2")).await.unwrap();
        assert!(!third.renewed);
        assert_ne!(second.secret, third.secret);

        let record = store.get("nodeA").await.unwrap();
        assert_eq!(record.push_type, "apns");
        assert_eq!(record.secret, third.secret);
        assert!(record.renewed.is_none());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, store) = service();

        assert_matches!(
            service.register(request("", "fcm", "tok1")).await,
            Err(Error::Validation(_))
        );
        assert_matches!(
            service.register(request("nodeA", "", "tok1")).await,
            Err(Error::Validation(_))
        );
        assert_matches!(
            service.register(request("nodeA", "fcm", "")).await,
            Err(Error::Validation(_))
        );
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister() {
        let (service, store) = service();
        let receipt = service.register(request("nodeA", "fcm", "tok1")).await.unwrap();

        let removed = service.unregister("nodeA", "fcm").await.unwrap();
        assert_eq!(removed.node, "nodeA");
        assert_eq!(removed.secret, receipt.secret);
        assert!(store.get("nodeA").await.is_none());

        assert_matches!(
            service.unregister("nodeA", "fcm").await,
            Err(Error::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_unregister_type_mismatch() {
        let (service, store) = service();
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();

        assert_matches!(
            service.unregister("nodeA", "apns").await,
            Err(Error::NotFound { .. })
        );
        assert!(store.get("nodeA").await.is_some());
    }

    #[tokio::test]
    async fn test_unregister_by_token_after_registration() {
        let (service, store) = service();
        let receipt = service.register(request("nodeA", "fcm", "tok1")).await.unwrap();

        let removed = service
            .unregister_by_token(UnregisterTokenRequest {
                token: "tok1".into(),
                push_type: "fcm".into(),
                timestamp: Utc::now() + Duration::seconds(1),
            })
            .await
            .unwrap();

        assert_eq!(removed.node, "nodeA");
        assert_eq!(removed.secret, receipt.secret);
        assert!(store.get("nodeA").await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_by_token_stale() {
        let (service, store) = service();
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        let record = store.get("nodeA").await.unwrap();

        // Equal to the registration time is not "after"
        let result = service
            .unregister_by_token(UnregisterTokenRequest {
                token: "tok1".into(),
                push_type: "fcm".into(),
                timestamp: record.registered,
            })
            .await;
        assert_matches!(result, Err(Error::StaleRequest { .. }));

        // Renewal moves the reference forward
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        let renewed = store.get("nodeA").await.unwrap().renewed.unwrap();
        let result = service
            .unregister_by_token(UnregisterTokenRequest {
                token: "tok1".into(),
                push_type: "fcm".into(),
                timestamp: renewed - Duration::milliseconds(1),
            })
            .await;
        assert_matches!(result, Err(Error::StaleRequest { .. }));

        assert_eq!(store.get("nodeA").await.unwrap(), {
            let mut expected = record.clone();
            expected.renewed = Some(renewed);
            expected
        });
    }

    #[tokio::test]
    async fn test_unregister_by_unknown_token() {
        let (service, _) = service();
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();

        let result = service
            .unregister_by_token(UnregisterTokenRequest {
                token: "tok-unknown".into(),
                push_type: "fcm".into(),
                timestamp: Utc::now() + Duration::seconds(1),
            })
            .await;
        assert_matches!(result, Err(Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unregister_by_token_rechecks_type() {
        let (service, store) = service();
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();

        let result = service
            .unregister_by_token(UnregisterTokenRequest {
                token: "tok1".into(),
                push_type: "apns".into(),
                timestamp: Utc::now() + Duration::seconds(1),
            })
            .await;
        assert_matches!(result, Err(Error::NotFound { .. }));
        assert!(store.get("nodeA").await.is_some());
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let (service, store) = service();
        let mut events = store.subscribe();

        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        service.register(request("nodeA", "fcm", "tok1")).await.unwrap();
        service.unregister("nodeA", "fcm").await.unwrap();

        assert_matches!(events.recv().await.unwrap(), RegistryEvent::Registered { .. });
        assert_matches!(events.recv().await.unwrap(), RegistryEvent::Renewed { .. });
        assert_matches!(
            events.recv().await.unwrap(),
            RegistryEvent::Unregistered { by_token: false, .. }
        );
    }
}
