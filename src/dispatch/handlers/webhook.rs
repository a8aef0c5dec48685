//! Webhook Handler
//!
//! Forwards each push as a JSON POST to an external delivery service. Any
//! 2xx answer counts as delivered.

use crate::dispatch::handler::{DeliveryFailure, DeliveryResult, PushContext, PushHandler};
use crate::error::{Error, Result};
use crate::registry::Registration;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response body excerpt kept as failure detail
const MAX_DETAIL_LEN: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration shared by webhook handlers
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    /// User agent sent with each request
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    node: &'a str,
    #[serde(rename = "type")]
    push_type: &'a str,
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stanza: Option<&'a str>,
}

// =============================================================================
// Webhook Handler
// =============================================================================

/// Handler that POSTs pushes to a URL
#[derive(Debug, Clone)]
pub struct WebhookHandler {
    url: Url,
    client: Client,
}

impl WebhookHandler {
    /// Create a webhook handler for a URL
    pub fn new(url: &str, config: &WebhookConfig) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::Configuration(format!("Invalid webhook URL {}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "Webhook URL must be http or https: {}",
                url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { url, client })
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PushHandler for WebhookHandler {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, record: &Registration, context: &PushContext) -> DeliveryResult {
        let payload = WebhookPayload {
            node: &record.node,
            push_type: &record.push_type,
            token: &record.token,
            origin: context.origin.as_deref(),
            stanza: context.stanza.as_deref(),
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!("Webhook {} unreachable: {}", self.url, e);
                DeliveryFailure::new(format!("webhook request failed: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook {} accepted push for node {}", self.url, record.node);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.trim().chars().take(MAX_DETAIL_LEN).collect();
        Err(DeliveryFailure::new(if excerpt.is_empty() {
            format!("webhook returned {}", status)
        } else {
            format!("webhook returned {}: {}", status, excerpt)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn spawn_receiver() -> SocketAddr {
        let app = Router::new()
            .route(
                "/ok",
                post(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["type"], "fcm");
                    assert_eq!(body["token"], "tok-1");
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/fail",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "quota exhausted") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_rejects_bad_urls() {
        let config = WebhookConfig::default();
        assert_matches!(
            WebhookHandler::new("not a url", &config),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            WebhookHandler::new("ftp://example.org/push", &config),
            Err(Error::Configuration(_))
        );
        assert!(WebhookHandler::new("https://push.example.org/v1", &config).is_ok());
    }

    #[tokio::test]
    async fn test_success_and_failure() {
        let addr = spawn_receiver().await;
        let config = WebhookConfig::default();
        let record = Registration::new("node-1", "fcm", "tok-1", "secret");

        let ok = WebhookHandler::new(&format!("http://{}/ok", addr), &config).unwrap();
        assert_eq!(ok.deliver(&record, &PushContext::default()).await, Ok(()));

        let fail = WebhookHandler::new(&format!("http://{}/fail", addr), &config).unwrap();
        let failure = fail
            .deliver(&record, &PushContext::default())
            .await
            .unwrap_err();
        let detail = failure.detail.unwrap();
        assert!(detail.contains("503"));
        assert!(detail.contains("quota exhausted"));
    }
}
