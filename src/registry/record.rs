//! Registration Record
//!
//! The durable unit of state kept per node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Registration
// =============================================================================

/// A node's push registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Caller-chosen node identifier (primary key)
    pub node: String,
    /// Handler type owning this registration
    #[serde(rename = "type")]
    pub push_type: String,
    /// Opaque device/channel token supplied by the registrant
    pub token: String,
    /// Server-issued authorization secret
    pub secret: String,
    /// First successful registration
    pub registered: DateTime<Utc>,
    /// Last idempotent re-registration
    #[serde(default)]
    pub renewed: Option<DateTime<Utc>>,
    /// Last push the handler accepted
    #[serde(default)]
    pub last_successful_push: Option<DateTime<Utc>>,
    /// Last push the handler rejected
    #[serde(default)]
    pub last_push_error: Option<DateTime<Utc>>,
    /// Detail reported with the last rejected push
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_push_error_detail: Option<String>,
}

impl Registration {
    /// Create a fresh registration
    pub fn new(
        node: impl Into<String>,
        push_type: impl Into<String>,
        token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            push_type: push_type.into(),
            token: token.into(),
            secret: secret.into(),
            registered: Utc::now(),
            renewed: None,
            last_successful_push: None,
            last_push_error: None,
            last_push_error_detail: None,
        }
    }

    /// Whether an incoming registration targets this same binding
    pub fn matches(&self, push_type: &str, token: &str) -> bool {
        self.push_type == push_type && self.token == token
    }

    /// Record an idempotent re-registration
    pub fn renew(&mut self) {
        self.renewed = Some(Utc::now());
    }

    /// Time an unregister request must be strictly after to be honoured
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.renewed.unwrap_or(self.registered)
    }

    /// Record a push the handler accepted
    pub fn record_push_success(&mut self) {
        self.last_successful_push = Some(Utc::now());
    }

    /// Record a push the handler rejected
    pub fn record_push_error(&mut self, detail: Option<String>) {
        self.last_push_error = Some(Utc::now());
        self.last_push_error_detail = detail;
    }
}
