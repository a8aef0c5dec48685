//! Push Broker
//!
//! Registration and dispatch broker for push notifications. Clients register
//! a node with a push type and a device token and receive a secret; whoever
//! holds the secret can later trigger a push to that node, which is handed to
//! the handler registered for the node's type.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          REST API (axum)                                 │
//! │   /v1/register   /v1/unregister   /v1/push   /v1/settings   /metrics     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                              Broker                                      │
//! │  ┌──────────────────────────┐          ┌──────────────────────────────┐  │
//! │  │  Registration Protocol   │          │       Dispatch Engine        │  │
//! │  │  (register/unregister)   │          │  (secret check + handlers)   │  │
//! │  └────────────┬─────────────┘          └──────────────┬───────────────┘  │
//! │               └──────────────────┬────────────────────┘                  │
//! │                      ┌───────────┴───────────┐                           │
//! │                      │  Registration Store   │──── events ──> metrics    │
//! │                      │  (cache + token index)│                           │
//! │                      └───────────┬───────────┘                           │
//! ├──────────────────────────────────┼──────────────────────────────────────┤
//! │                       Record Storage Backends                            │
//! │          ┌─────────────────┐            ┌─────────────────┐              │
//! │          │     Memory      │            │   File (JSON)   │              │
//! │          └─────────────────┘            └─────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST router and server
//! - [`broker`]: Wiring and plain-text replies
//! - [`dispatch`]: Push dispatch and built-in handlers
//! - [`protocol`]: Registration protocol and secrets
//! - [`registry`]: Registration store, caches and storage backends
//! - [`metrics`]: Prometheus metrics
//! - [`error`]: Error types and handling

pub mod api;
pub mod broker;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod registry;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, FormFields, RestRouter};

pub use broker::{Broker, BrokerConfig, Reply, HOST_MAX_BODY_SIZE};

pub use dispatch::{
    DeliveryFailure, DeliveryResult, DispatchEngine, HandlerFactory, HandlerKind,
    HandlerRegistry, HandlerSpec, LogHandler, PushContext, PushHandler, PushReceipt,
    WebhookConfig, WebhookHandler,
};

pub use error::{Error, ReplyClass, Result};

pub use metrics::BrokerMetrics;

pub use protocol::{
    RegisterRequest, RegistrationReceipt, RegistrationService, UnregisterReceipt,
    UnregisterTokenRequest,
};

pub use registry::{
    FileStorage, FileStorageConfig, MemoryStorage, RecordStorage, Registration,
    RegistrationStore, RegistryEvent, SharedRecordStorage, TokenIndex,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
