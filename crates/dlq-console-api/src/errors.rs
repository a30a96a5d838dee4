//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dlq_console_core::{ConsoleError, ErrorKind};
use dlq_runtime::GatewayError;
use tracing::{error, warn};

/// Request handler errors with HTTP status code mapping
///
/// - `404 Not Found`: unknown queue or message
/// - `409 Conflict`: the queue has no redrive sources
/// - `501 Not Implemented`: bulk redrive
/// - `502 Bad Gateway`: the queue service failed or was unreachable
///
/// Every response carries a JSON body `{error, kind, status, timestamp}`.
/// An incomplete redrive also includes its `report` so the caller can see
/// which copies were published.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Console(e) => e.kind(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Precondition => StatusCode::CONFLICT,
            ErrorKind::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::GatewayFailure => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        let message = self.to_string();

        if status.is_server_error() {
            error!(kind = %kind, error = %message, "Request failed");
        } else {
            warn!(kind = %kind, error = %message, "Request rejected");
        }

        let mut body = serde_json::json!({
            "error": message,
            "kind": kind,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let Self::Console(console_error) = &self;
        if let Some(report) = console_error.redrive_report() {
            body["report"] = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
        }

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue gateway could not be created: {0}")]
    Gateway(#[from] GatewayError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
            Self::Gateway(_) => 4,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}
