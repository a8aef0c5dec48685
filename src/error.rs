//! Error types for the Push Broker
//!
//! Provides structured error types for the registration store, the
//! registration protocol, the dispatch engine and the API surface.

use thiserror::Error;

/// Unified error type for the broker
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("Request validation failed: {0}")]
    Validation(String),

    #[error("Node not found: {node}")]
    NotFound { node: String },

    /// Secret mismatch. Rendered exactly like `NotFound` at the boundary.
    #[error("Push not authorized for node: {node}")]
    Unauthorized { node: String },

    #[error("Stale unregister for node {node}: request at {requested}, last renewal at {reference}")]
    StaleRequest {
        node: String,
        requested: String,
        reference: String,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage backend unavailable: {backend}")]
    StorageUnavailable { backend: String },

    // =========================================================================
    // Dispatch Errors
    // =========================================================================
    #[error("No push handler registered for type: {push_type}")]
    HandlerNotFound { push_type: String },

    #[error("Push handler {push_type} failed for node {node}: {detail}")]
    Handler {
        node: String,
        push_type: String,
        detail: String,
    },

    #[error("Webhook request error: {0}")]
    Webhook(#[from] reqwest::Error),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Class of reply a failed operation maps to at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// Malformed or incomplete request
    BadRequest,
    /// Unknown node, wrong type, wrong secret or stale unregister
    NotFound,
    /// Storage or handler failure
    Internal,
}

impl Error {
    /// Determine how this error is reported to the caller
    pub fn reply_class(&self) -> ReplyClass {
        match self {
            Error::Validation(_) => ReplyClass::BadRequest,

            // Authorization failures are indistinguishable from unknown nodes
            Error::NotFound { .. }
            | Error::Unauthorized { .. }
            | Error::StaleRequest { .. } => ReplyClass::NotFound,

            _ => ReplyClass::Internal,
        }
    }

    /// Check if this error is the caller's fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self.reply_class(), ReplyClass::Internal)
    }

    /// Check if this error came from a push handler
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            Error::HandlerNotFound { .. } | Error::Handler { .. } | Error::Webhook(_)
        )
    }
}

/// Result type alias for the broker
pub type Result<T> = std::result::Result<T, Error>;
