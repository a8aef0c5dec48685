//! Log Handler
//!
//! Accepts every push and logs it. Useful for development setups and for
//! types whose delivery is handled entirely out of band.

use crate::dispatch::handler::{DeliveryResult, PushContext, PushHandler};
use crate::registry::Registration;
use async_trait::async_trait;
use tracing::info;

/// Handler that logs and succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

#[async_trait]
impl PushHandler for LogHandler {
    fn kind(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, record: &Registration, context: &PushContext) -> DeliveryResult {
        info!(
            node = %record.node,
            push_type = %record.push_type,
            origin = context.origin.as_deref().unwrap_or("-"),
            stanza_triggered = context.is_stanza_triggered(),
            "Push accepted by log handler"
        );
        Ok(())
    }
}
