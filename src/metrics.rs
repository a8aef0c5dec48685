//! Broker Metrics
//!
//! Prometheus counters fed from the registry event stream.

use crate::error::Result;
use crate::registry::RegistryEvent;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Prometheus metrics for the broker
pub struct BrokerMetrics {
    registry: Registry,
    registrations: IntCounterVec,
    renewals: IntCounterVec,
    unregistrations: IntCounterVec,
    stale_unregisters: IntCounter,
    pushes: IntCounterVec,
    nodes: IntGauge,
}

impl BrokerMetrics {
    /// Create and register all metrics in a private registry
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new();

        let registrations = IntCounterVec::new(
            Opts::new("push_broker_registrations_total", "New registrations by push type"),
            &["type"],
        )?;
        let renewals = IntCounterVec::new(
            Opts::new("push_broker_renewals_total", "Idempotent re-registrations by push type"),
            &["type"],
        )?;
        let unregistrations = IntCounterVec::new(
            Opts::new("push_broker_unregistrations_total", "Unregistrations by method"),
            &["method"],
        )?;
        let stale_unregisters = IntCounter::new(
            "push_broker_stale_unregisters_total",
            "Unregister-by-token requests rejected as stale",
        )?;
        let pushes = IntCounterVec::new(
            Opts::new("push_broker_pushes_total", "Push dispatches by push type and outcome"),
            &["type", "outcome"],
        )?;
        let nodes = IntGauge::new("push_broker_nodes", "Registered nodes")?;

        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(renewals.clone()))?;
        registry.register(Box::new(unregistrations.clone()))?;
        registry.register(Box::new(stale_unregisters.clone()))?;
        registry.register(Box::new(pushes.clone()))?;
        registry.register(Box::new(nodes.clone()))?;

        Ok(Arc::new(Self {
            registry,
            registrations,
            renewals,
            unregistrations,
            stale_unregisters,
            pushes,
            nodes,
        }))
    }

    /// Account for one event
    pub fn observe(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Registered { push_type, .. } => {
                self.registrations.with_label_values(&[push_type.as_str()]).inc();
            }
            RegistryEvent::Renewed { push_type, .. } => {
                self.renewals.with_label_values(&[push_type.as_str()]).inc();
            }
            RegistryEvent::Unregistered { by_token, .. } => {
                let method = if *by_token { "token" } else { "node" };
                self.unregistrations.with_label_values(&[method]).inc();
            }
            RegistryEvent::StaleUnregisterRejected { .. } => self.stale_unregisters.inc(),
            RegistryEvent::PushDelivered { push_type, .. } => {
                self.pushes.with_label_values(&[push_type.as_str(), "success"]).inc();
            }
            RegistryEvent::PushFailed { push_type, .. } => {
                self.pushes.with_label_values(&[push_type.as_str(), "failure"]).inc();
            }
        }
    }

    /// Set the live node gauge
    pub fn set_nodes(&self, count: u64) {
        self.nodes.set(count as i64);
    }

    /// Consume events until the channel closes
    pub fn spawn_recorder(self: &Arc<Self>, mut events: broadcast::Receiver<RegistryEvent>) -> JoinHandle<()> {
        let metrics = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => metrics.observe(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Metrics recorder lagged, {} events not counted", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Metrics recorder stopped");
        })
    }

    /// Render in the prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_encode() {
        let metrics = BrokerMetrics::new().unwrap();

        metrics.observe(&RegistryEvent::Registered {
            node: "nodeA".into(),
            push_type: "fcm".into(),
        });
        metrics.observe(&RegistryEvent::PushFailed {
            node: "nodeA".into(),
            push_type: "fcm".into(),
            reason: None,
        });
        metrics.set_nodes(1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("push_broker_registrations_total{type=\"fcm\"} 1"));
        assert!(text
            .lines()
            .any(|l| l.starts_with("push_broker_pushes_total{") && l.contains("outcome=\"failure\"")));
        assert!(text.contains("push_broker_nodes 1"));
    }

    #[tokio::test]
    async fn test_recorder_consumes_events() {
        let metrics = BrokerMetrics::new().unwrap();
        let (tx, rx) = broadcast::channel(16);
        let handle = metrics.spawn_recorder(rx);

        tx.send(RegistryEvent::StaleUnregisterRejected { node: "nodeA".into() })
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(metrics.stale_unregisters.get(), 1);
    }
}
