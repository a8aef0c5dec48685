//! Dispatch Module
//!
//! Authenticated push dispatch through a registry of per-type handlers.

pub mod engine;
pub mod handler;
pub mod handlers;

pub use engine::*;
pub use handler::*;
pub use handlers::{HandlerFactory, HandlerKind, HandlerSpec, LogHandler, WebhookConfig, WebhookHandler};
