//! Common test utilities for dlq-console-api integration tests
//!
//! This module provides:
//! - A console wired to an in-memory gateway with seeded queues
//! - Helpers for sending requests through the router and reading JSON

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dlq_console_api::{create_router, ApiMetrics, AppState, ServiceConfig};
use dlq_console_core::{DirectoryConfig, DlqConsole, RetrievalConfig};
use dlq_runtime::{AttributeMap, InMemoryGateway, OutboundMessage, QueueLocator};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Dead-letter queue every test environment creates
pub const DLQ: &str = "orders-dlq";

/// Queue that redrives into [`DLQ`]
pub const SOURCE: &str = "orders";

/// Second source queue, only present when requested
pub const SECOND_SOURCE: &str = "orders-replay";

/// Router plus handles on the gateway and console behind it
pub struct TestEnvironment {
    pub gateway: Arc<InMemoryGateway>,
    pub console: Arc<DlqConsole>,
    pub router: Router,
}

#[allow(dead_code)]
impl TestEnvironment {
    /// `orders` redriving into `orders-dlq`, plus an unrelated `billing` queue
    pub async fn new() -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let dlq = gateway.create_queue(DLQ);
        let source = gateway.create_queue(SOURCE);
        gateway.create_queue("billing");
        gateway.add_redrive_source(&dlq, &source);

        Self::with_gateway(gateway).await
    }

    /// Like [`TestEnvironment::new`] with a second source queue
    pub async fn with_two_sources() -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let dlq = gateway.create_queue(DLQ);
        let source = gateway.create_queue(SOURCE);
        let second = gateway.create_queue(SECOND_SOURCE);
        gateway.add_redrive_source(&dlq, &source);
        gateway.add_redrive_source(&dlq, &second);

        Self::with_gateway(gateway).await
    }

    /// Console over `gateway`, refreshed once
    ///
    /// Messages become visible again immediately after a receive so that
    /// consecutive requests in one test see the same queue contents.
    pub async fn with_gateway(gateway: Arc<InMemoryGateway>) -> Self {
        let retrieval = RetrievalConfig {
            visibility_timeout: Duration::ZERO,
            wait_time: Duration::ZERO,
            ..RetrievalConfig::default()
        };
        Self::with_retrieval(gateway, retrieval).await
    }

    pub async fn with_retrieval(gateway: Arc<InMemoryGateway>, retrieval: RetrievalConfig) -> Self {
        let console = Arc::new(DlqConsole::new(
            gateway.clone(),
            DirectoryConfig::default(),
            retrieval,
        ));
        console
            .directory()
            .refresh()
            .await
            .expect("initial refresh should succeed");

        let mut config = ServiceConfig::default();
        config.server.static_dir = None;
        let state = AppState::new(
            config,
            console.clone(),
            ApiMetrics::new().expect("metrics registry"),
        );

        Self {
            gateway,
            console,
            router: create_router(state),
        }
    }

    pub fn locator(name: &str) -> QueueLocator {
        InMemoryGateway::locator_for(name)
    }

    /// Put a message on `queue` and return its id
    pub fn seed(&self, queue: &str, body: &str) -> String {
        self.seed_with_attributes(queue, body, AttributeMap::new())
    }

    pub fn seed_with_attributes(&self, queue: &str, body: &str, attributes: AttributeMap) -> String {
        self.gateway
            .seed_message(
                &Self::locator(queue),
                OutboundMessage::new(body).with_attributes(attributes),
            )
            .expect("queue should exist")
    }

    pub fn bodies(&self, queue: &str) -> Vec<String> {
        self.gateway
            .message_bodies(&Self::locator(queue))
            .expect("queue should exist")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send("GET", uri).await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send("POST", uri).await
    }

    async fn send(&self, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
