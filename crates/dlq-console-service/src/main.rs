//! # DLQ Console Service
//!
//! Binary entry point for the DLQ console HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Builds the queue gateway and the console
//! - Keeps the queue directory refreshed in the background
//! - Starts the HTTP server from dlq-console-api

use dlq_console_api::{start_server, LoggingConfig, ServiceConfig, ServiceError};
use dlq_console_core::{DlqConsole, RefreshTask};
use dlq_runtime::create_gateway;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/dlq-console/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by DLQ_CONFIG_FILE
    //  4. Environment variables prefixed DLQ__ (double-underscore separator),
    //     e.g. DLQ__SERVER__PORT=9090 sets server.port = 9090
    // -------------------------------------------------------------------------
    let service_config = match ServiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(ServiceError::from(e).exit_code());
        }
    };

    init_tracing(&service_config.logging);

    info!(
        provider = ?service_config.gateway.provider_type(),
        "Starting DLQ console service"
    );

    if let Err(e) = run(service_config).await {
        error!(error = %e, "DLQ console service failed");
        std::process::exit(e.exit_code());
    }
}

async fn run(service_config: ServiceConfig) -> Result<(), ServiceError> {
    let gateway = create_gateway(&service_config.gateway)?;

    let directory_config = service_config.directory.to_directory_config();
    let refresh_interval = directory_config.refresh_interval;
    let console = Arc::new(DlqConsole::new(
        gateway,
        directory_config,
        service_config.retrieval.to_retrieval_config(),
    ));

    // The first refresh runs immediately; until it completes, lookups report
    // every queue as not found and /health answers 503.
    let refresh = RefreshTask::spawn(Arc::clone(console.directory()), refresh_interval);

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        refresh_interval_minutes = refresh_interval.as_secs() / 60,
        "Starting HTTP server"
    );

    let result = start_server(service_config, console).await;

    refresh.shutdown().await;
    info!("Directory refresh stopped");

    result
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
