//! # DLQ Console HTTP Service
//!
//! HTTP surface of the dead-letter-queue console.
//!
//! This service provides:
//! - Queue listing with search and paging
//! - Message inspection, deletion and single-message redrive
//! - Queue purge and redrive-source lookup
//! - Health and Prometheus metrics endpoints
//! - Static UI assets served for every path no API route matches

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    DirectorySettings, LoggingConfig, RetrievalSettings, RetrySettings, ServerConfig,
    ServiceConfig,
};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use metrics::ApiMetrics;
pub use responses::{
    ActionResponse, HealthResponse, ListQueuesParams, MessageListResponse, SourceListResponse,
};

use axum::{
    extract::{MatchedPath, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use dlq_console_core::{DirectoryState, QueueConsole, QueueListing, RedriveReport};
use metrics::redrive_outcome;
use std::{
    future::IntoFuture,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Console operations backing every API route
    pub console: Arc<dyn QueueConsole>,

    /// Metrics collector for observability
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        console: Arc<dyn QueueConsole>,
        metrics: Arc<ApiMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            console,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/queues", get(list_queues))
        .route("/api/queues/{queue}/messages", get(list_messages))
        .route(
            "/api/queues/{queue}/messages/{message_id}/delete",
            post(delete_message),
        )
        .route(
            "/api/queues/{queue}/messages/{message_id}/retry",
            post(retry_message),
        )
        .route("/api/queues/{queue}/purge", post(purge_queue))
        .route("/api/queues/{queue}/retryAll", post(retry_all_messages))
        .route("/api/queues/{queue}/sources", get(list_sources));

    let observability_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(api_routes)
        .merge(observability_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ));

    if let Some(static_dir) = &state.config.server.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }
    if state.config.server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    let request_timeout = Duration::from_secs(state.config.server.timeout_seconds);
    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server and run until SIGINT or SIGTERM
pub async fn start_server(
    config: ServiceConfig,
    console: Arc<dyn QueueConsole>,
) -> Result<(), ServiceError> {
    let metrics = ApiMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = address.parse().map_err(|_| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Invalid listen address: {}", address),
        })
    })?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let app = create_router(AppState::new(config, console, metrics));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    // In-flight requests get `shutdown_timeout` to finish once a signal arrives
    let mut deadline_rx = shutdown_rx;
    let deadline = async move {
        let _ = deadline_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;
        }
        _ = deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping remaining connections"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Queue Handlers
// ============================================================================

/// One page of queues matching the search term
#[instrument(skip(state))]
async fn list_queues(
    State(state): State<AppState>,
    Query(params): Query<ListQueuesParams>,
) -> Result<Json<QueueListing>, ApiError> {
    let (page, size) = params.paging();
    let listing = state
        .console
        .list_queues(page, size, params.search())
        .await?;
    Ok(Json(listing))
}

#[instrument(skip(state))]
async fn list_messages(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let page = state.console.fetch_messages(&queue).await?;
    Ok(Json(MessageListResponse {
        messages: page.messages,
        total: page.approximate_total,
    }))
}

#[instrument(skip(state))]
async fn delete_message(
    State(state): State<AppState>,
    Path((queue, message_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.console.delete_message(&queue, &message_id).await?;
    Ok(Json(ActionResponse {
        status: "deleted".to_string(),
        queue_name: queue,
        message_id: Some(message_id),
    }))
}

#[instrument(skip(state))]
async fn retry_message(
    State(state): State<AppState>,
    Path((queue, message_id)): Path<(String, String)>,
) -> Result<Json<RedriveReport>, ApiError> {
    match state.console.retry_message(&queue, &message_id).await {
        Ok(report) => {
            state.metrics.record_redrive(redrive_outcome::COMPLETE);
            Ok(Json(report))
        }
        Err(e) => {
            let outcome = if e.redrive_report().is_some() {
                redrive_outcome::INCOMPLETE
            } else {
                redrive_outcome::REJECTED
            };
            state.metrics.record_redrive(outcome);
            Err(e.into())
        }
    }
}

#[instrument(skip(state))]
async fn purge_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.console.purge_queue(&queue).await?;
    Ok(Json(ActionResponse {
        status: "purge_requested".to_string(),
        queue_name: queue,
        message_id: None,
    }))
}

#[instrument(skip(state))]
async fn retry_all_messages(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.console.retry_all_messages(&queue).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state))]
async fn list_sources(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Result<Json<SourceListResponse>, ApiError> {
    let sources = state.console.list_redrive_sources(&queue).await?;
    Ok(Json(SourceListResponse { sources }))
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Health check; unavailable until the first directory refresh completes
#[instrument(skip(state))]
async fn handle_health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let directory = state.console.directory_state().await;
    let (status_code, status) = match directory {
        DirectoryState::Empty => (StatusCode::SERVICE_UNAVAILABLE, "starting"),
        DirectoryState::Populated { .. } => (StatusCode::OK, "healthy"),
    };

    let response = HealthResponse {
        status: status.to_string(),
        directory,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    };
    (status_code, Json(response))
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    let directory = state.console.directory_state().await;
    state.metrics.update_directory(&directory);

    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Records request count and latency labelled by the matched route template,
/// which keeps queue names and message ids out of the label set
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    state
        .metrics
        .record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}
