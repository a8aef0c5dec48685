//! REST API Handlers
//!
//! Implements the broker's HTTP surface: form-encoded requests in, plain-text
//! `OK`/`ERROR` replies out, plus health, readiness and metrics endpoints.

use crate::api::form::FormFields;
use crate::broker::{Broker, Reply};
use crate::dispatch::PushContext;
use crate::error::ReplyClass;
use crate::metrics::BrokerMetrics;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    broker: Arc<Broker>,
    metrics: Arc<BrokerMetrics>,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(broker: Arc<Broker>, metrics: Arc<BrokerMetrics>) -> Self {
        Self { broker, metrics }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            broker: self.broker,
            metrics: self.metrics,
        };

        Router::new()
            // Registration endpoints
            .route("/v1/register", post(register))
            .route("/v1/unregister", post(unregister))
            // Dispatch endpoint
            .route("/v1/push", post(push))
            // Debug endpoints
            .route("/v1/settings", get(list_settings))
            .route("/v1/settings/:node", get(get_settings))
            // Operational endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    broker: Arc<Broker>,
    metrics: Arc<BrokerMetrics>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a node
async fn register(State(state): State<AppState>, body: Body) -> Response {
    let form = match read_form(&state, body).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let (push_type, node, token) = match (form.require("type"), form.require("node"), form.require("token")) {
        (Ok(push_type), Ok(node), Ok(token)) => (push_type, node, token),
        _ => return bad_request(),
    };

    reply_response(state.broker.register(node, push_type, token).await)
}

/// Unregister a node
async fn unregister(State(state): State<AppState>, body: Body) -> Response {
    let form = match read_form(&state, body).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let (push_type, node) = match (form.require("type"), form.require("node")) {
        (Ok(push_type), Ok(node)) => (push_type, node),
        _ => return bad_request(),
    };

    reply_response(state.broker.unregister(node, push_type).await)
}

/// Trigger a push
async fn push(State(state): State<AppState>, body: Body) -> Response {
    let form = match read_form(&state, body).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let (node, secret) = match (form.require("node"), form.require("secret")) {
        (Ok(node), Ok(secret)) => (node, secret),
        _ => return bad_request(),
    };

    reply_response(state.broker.push(node, secret, PushContext::default()).await)
}

/// List registered nodes (debug only)
async fn list_settings(State(state): State<AppState>) -> Response {
    if !state.broker.config().debug_settings {
        return StatusCode::NOT_FOUND.into_response();
    }

    (StatusCode::OK, Json(state.broker.nodes().await)).into_response()
}

/// Dump one registration (debug only)
async fn get_settings(State(state): State<AppState>, Path(node): Path<String>) -> Response {
    if !state.broker.config().debug_settings {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.broker.settings(&node).await {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.broker.store().health_check().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
    }
}

/// Prometheus metrics
async fn metrics(State(state): State<AppState>) -> Response {
    state.metrics.set_nodes(state.broker.store().node_count());

    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Read and decode a form body within the configured limit
async fn read_form(state: &AppState, body: Body) -> Result<FormFields, Response> {
    let limit = state.broker.config().effective_body_limit();

    let bytes: Bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        debug!("Rejected request body: {}", e);
        bad_request()
    })?;

    FormFields::parse(&bytes).map_err(|e| {
        debug!("Rejected form: {}", e);
        bad_request()
    })
}

fn bad_request() -> Response {
    reply_response(Reply::Error {
        class: ReplyClass::BadRequest,
        message: "Bad Request".into(),
    })
}

/// Map a protocol reply onto an HTTP response
fn reply_response(reply: Reply) -> Response {
    let status = match reply.class() {
        None => StatusCode::OK,
        Some(class) => status_for(class),
    };
    (status, reply.to_string()).into_response()
}

fn status_for(class: ReplyClass) -> StatusCode {
    match class {
        ReplyClass::BadRequest => StatusCode::BAD_REQUEST,
        ReplyClass::NotFound => StatusCode::NOT_FOUND,
        ReplyClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::dispatch::{HandlerRegistry, LogHandler};
    use crate::registry::{MemoryStorage, RegistrationStore};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router_with(config: BrokerConfig) -> Router {
        let store = RegistrationStore::new(Arc::new(MemoryStorage::new()));
        let mut handlers = HandlerRegistry::new();
        handlers.register("fcm", Arc::new(LogHandler)).unwrap();
        let broker = Broker::new(config, store, handlers);
        RestRouter::new(broker, BrokerMetrics::new().unwrap()).build()
    }

    fn router() -> Router {
        router_with(BrokerConfig::default())
    }

    fn form_post(uri: &str, body: impl Into<String>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.into()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_register_push_unregister_flow() {
        let app = router();

        let (status, body) = send(&app, form_post("/v1/register", "type=fcm&node=nodeA&token=tok1")).await;
        assert_eq!(status, StatusCode::OK);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "OK");
        assert_eq!(lines[1], "nodeA");
        let secret = lines[2].to_string();

        let (status, body) = send(&app, form_post("/v1/push", format!("node=nodeA&secret={}", secret))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK\nnodeA");

        let (status, body) = send(&app, form_post("/v1/unregister", "type=fcm&node=nodeA")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("OK\nnodeA\n{}", secret));

        let (status, body) = send(&app, form_post("/v1/push", format!("node=nodeA&secret={}", secret))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "ERROR\nNode or secret not found!");
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_requests() {
        let app = router();

        let (status, body) = send(&app, form_post("/v1/register", "type=fcm&node=nodeA")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "ERROR\nBad Request");

        let (status, _) = send(&app, form_post("/v1/unregister", "node=nodeA")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, form_post("/v1/push", "node=nodeA")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let app = router_with(BrokerConfig {
            body_size_limit: 64,
            ..Default::default()
        });

        let token = "x".repeat(128);
        let (status, body) = send(&app, form_post("/v1/register", format!("type=fcm&node=nodeA&token={}", token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "ERROR\nBad Request");

        let (status, _) = send(&app, form_post("/v1/register", "type=fcm&node=nodeA&token=t")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_unregister_is_not_found() {
        let app = router();
        let (status, body) = send(&app, form_post("/v1/unregister", "type=fcm&node=ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "ERROR\nNode not found!");
    }

    #[tokio::test]
    async fn test_handler_failure_is_internal_error() {
        let app = router();
        let (_, body) = send(&app, form_post("/v1/register", "type=apns&node=nodeB&token=tok2")).await;
        let secret = body.lines().nth(2).unwrap().to_string();

        let (status, body) = send(&app, form_post("/v1/push", format!("node=nodeB&secret={}", secret))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "ERROR\nInternal Server Error");
    }

    #[tokio::test]
    async fn test_settings_gated_by_debug_flag() {
        let app = router();
        let request = Request::get("/v1/settings").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let app = router_with(BrokerConfig {
            debug_settings: true,
            ..Default::default()
        });
        send(&app, form_post("/v1/register", "type=fcm&node=nodeA&token=tok1")).await;

        let request = Request::get("/v1/settings").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let nodes: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(nodes, vec!["nodeA".to_string()]);

        let request = Request::get("/v1/settings/nodeA").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let record: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(record["type"], "fcm");
        assert_eq!(record["token"], "tok1");

        let request = Request::get("/v1/settings/ghost").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_operational_endpoints() {
        let app = router();

        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, _) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("push_broker_nodes"));
    }

    #[tokio::test]
    async fn test_readiness_follows_storage() {
        let backend = Arc::new(MemoryStorage::new());
        let store = RegistrationStore::new(backend.clone());
        let broker = Broker::new(BrokerConfig::default(), store, HandlerRegistry::new());
        let app = RestRouter::new(broker, BrokerMetrics::new().unwrap()).build();

        backend.set_available(false);
        let (status, _) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
