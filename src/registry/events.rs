//! Registry Events
//!
//! Events emitted by the registration store for external consumers to react
//! to registration and dispatch lifecycle changes.

use serde::{Deserialize, Serialize};

/// Events emitted by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A new registration was created (fresh secret issued)
    Registered { node: String, push_type: String },

    /// An existing registration was renewed
    Renewed { node: String, push_type: String },

    /// A registration was deleted
    Unregistered {
        node: String,
        push_type: String,
        by_token: bool,
    },

    /// An unregister-by-token arrived before the last renewal
    StaleUnregisterRejected { node: String },

    /// A handler accepted a push
    PushDelivered { node: String, push_type: String },

    /// A handler rejected a push, or none was registered
    PushFailed {
        node: String,
        push_type: String,
        reason: Option<String>,
    },
}

impl RegistryEvent {
    /// Get the node associated with this event
    pub fn node(&self) -> &str {
        match self {
            RegistryEvent::Registered { node, .. } => node,
            RegistryEvent::Renewed { node, .. } => node,
            RegistryEvent::Unregistered { node, .. } => node,
            RegistryEvent::StaleUnregisterRejected { node } => node,
            RegistryEvent::PushDelivered { node, .. } => node,
            RegistryEvent::PushFailed { node, .. } => node,
        }
    }

    /// Check if this is a dispatch event
    pub fn is_push_event(&self) -> bool {
        matches!(
            self,
            RegistryEvent::PushDelivered { .. } | RegistryEvent::PushFailed { .. }
        )
    }
}
