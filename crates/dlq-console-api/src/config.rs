//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so an empty configuration source
//! produces a runnable service pointed at AWS SQS in `us-east-1`.

use crate::errors::ConfigError;
use dlq_console_core::{DirectoryConfig, RetrievalConfig, RetryPolicy};
use dlq_runtime::message::MAX_RECEIVE_BATCH;
use dlq_runtime::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// System-wide configuration file, without extension
pub const SYSTEM_CONFIG_PATH: &str = "/etc/dlq-console/service";

/// Deployment-local configuration file, without extension
pub const LOCAL_CONFIG_PATH: &str = "config/service";

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "DLQ_CONFIG_FILE";

/// Prefix of environment variable overrides, e.g. `DLQ__SERVER__PORT`
pub const ENV_PREFIX: &str = "DLQ";

/// Longest long-poll wait the queue service accepts
const MAX_WAIT_TIME_SECONDS: u64 = 20;

/// One week
const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Queue service connection
    pub gateway: ProviderConfig,

    /// Queue directory refresh settings
    pub directory: DirectorySettings,

    /// Message receive settings
    pub retrieval: RetrievalSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from the standard sources
    ///
    /// Sources are applied in order, later ones overriding earlier ones:
    /// 1. `/etc/dlq-console/service.yaml`
    /// 2. `./config/service.yaml`
    /// 3. the file named by `DLQ_CONFIG_FILE` (must exist when set)
    /// 4. `DLQ__`-prefixed environment variables with `__` separators
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name(SYSTEM_CONFIG_PATH)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name(LOCAL_CONFIG_PATH)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Ok(explicit_path) = std::env::var(CONFIG_FILE_ENV) {
            if !explicit_path.is_empty() {
                info!(path = %explicit_path, "Loading configuration from explicit path");
                builder = builder.add_source(
                    config::File::with_name(&explicit_path)
                        .required(true)
                        .format(config::FileFormat::Yaml),
                );
            }
        }

        let service_config: ServiceConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        service_config.validate()?;
        Ok(service_config)
    }

    /// Check values that deserialize fine but cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.timeout_seconds must be at least 1".to_string(),
            });
        }

        if let ProviderConfig::AwsSqs(sqs) = &self.gateway {
            if sqs.region.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: "gateway.region".to_string(),
                });
            }
        }

        if self.directory.refresh_interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                message: "directory.refresh_interval_minutes must be at least 1".to_string(),
            });
        }

        if self.directory.refresh_interval_minutes > MAX_REFRESH_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid {
                message: format!(
                    "directory.refresh_interval_minutes must be at most {}",
                    MAX_REFRESH_INTERVAL_MINUTES
                ),
            });
        }

        if self.directory.list_page_size == 0 {
            return Err(ConfigError::Invalid {
                message: "directory.list_page_size must be at least 1".to_string(),
            });
        }

        if self.directory.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                message: "directory.retry.backoff_multiplier must be at least 1.0".to_string(),
            });
        }

        if self.directory.retry.initial_delay_ms > self.directory.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                message: "directory.retry.initial_delay_ms exceeds max_delay_ms".to_string(),
            });
        }

        if self.retrieval.batch_size == 0 || self.retrieval.batch_size > MAX_RECEIVE_BATCH {
            return Err(ConfigError::Invalid {
                message: format!(
                    "retrieval.batch_size must be between 1 and {}",
                    MAX_RECEIVE_BATCH
                ),
            });
        }

        if self.retrieval.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigError::Invalid {
                message: format!(
                    "retrieval.wait_time_seconds must not exceed {}",
                    MAX_WAIT_TIME_SECONDS
                ),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,

    /// Directory served for paths no API route matches
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
            enable_compression: true,
            static_dir: Some("static".to_string()),
        }
    }
}

/// Queue directory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub refresh_interval_minutes: u64,
    pub list_page_size: u32,
    pub retry: RetrySettings,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 120,
            list_page_size: 1000,
            retry: RetrySettings::default(),
        }
    }
}

impl DirectorySettings {
    pub fn to_directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)),
            list_page_size: self.list_page_size,
            retry_policy: self.retry.to_retry_policy(),
        }
    }
}

/// Backoff for failed list calls during a refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries before the cycle is abandoned; unset retries forever
    pub max_retries: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::forever(
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_multiplier,
        );
        match self.max_retries {
            Some(max_retries) => policy.with_max_retries(max_retries),
            None => policy,
        }
    }
}

/// Message retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub batch_size: u32,
    pub visibility_timeout_seconds: u64,
    pub wait_time_seconds: u64,
    pub message_attribute_names: Vec<String>,
    pub system_attribute_names: Vec<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            batch_size: defaults.batch_size,
            visibility_timeout_seconds: defaults.visibility_timeout.as_secs(),
            wait_time_seconds: defaults.wait_time.as_secs(),
            message_attribute_names: defaults.message_attribute_names,
            system_attribute_names: defaults.system_attribute_names,
        }
    }
}

impl RetrievalSettings {
    pub fn to_retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            batch_size: self.batch_size,
            visibility_timeout: Duration::from_secs(self.visibility_timeout_seconds),
            wait_time: Duration::from_secs(self.wait_time_seconds),
            message_attribute_names: self.message_attribute_names.clone(),
            system_attribute_names: self.system_attribute_names.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "dlq_console_service=info,dlq_console_api=info,dlq_console_core=info,dlq_runtime=info,tower_http=info".to_string(),
            json_format: false,
        }
    }
}
