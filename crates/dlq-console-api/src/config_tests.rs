//! Tests for [`ServiceConfig`] defaults, validation and loading.

use super::*;
use dlq_runtime::{AwsSqsConfig, InMemoryConfig};
use serial_test::serial;
use std::io::Write;

/// Clears the configuration environment variables for the duration of a test
struct EnvGuard {
    keys: Vec<&'static str>,
}

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        std::env::remove_var(CONFIG_FILE_ENV);
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        Self {
            keys: vars.iter().map(|(k, _)| *k).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
        std::env::remove_var(CONFIG_FILE_ENV);
    }
}

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Defaults
// ============================================================================

mod defaults_tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir.as_deref(), Some("static"));
        assert!(matches!(config.gateway, ProviderConfig::AwsSqs(_)));
    }

    #[test]
    fn test_directory_defaults_convert() {
        let directory = DirectorySettings::default().to_directory_config();

        assert_eq!(directory, DirectoryConfig::default());
        assert_eq!(directory.refresh_interval, Duration::from_secs(7200));
        assert!(directory.retry_policy.max_retries.is_none());
    }

    #[test]
    fn test_retrieval_defaults_convert() {
        assert_eq!(
            RetrievalSettings::default().to_retrieval_config(),
            RetrievalConfig::default()
        );
    }

    #[test]
    fn test_bounded_retry_settings() {
        let settings = RetrySettings {
            max_retries: Some(4),
            initial_delay_ms: 250,
            max_delay_ms: 2_000,
            backoff_multiplier: 3.0,
        };

        let policy = settings.to_retry_policy();

        assert_eq!(policy.max_retries, Some(4));
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.multiplier, 3.0);
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_empty_region_is_missing() {
        let mut config = ServiceConfig::default();
        config.gateway = ProviderConfig::AwsSqs(AwsSqsConfig {
            region: " ".to_string(),
            ..AwsSqsConfig::default()
        });

        let error = config.validate().unwrap_err();

        assert!(matches!(error, ConfigError::Missing { ref key } if key == "gateway.region"));
    }

    #[test]
    fn test_in_memory_gateway_needs_no_region() {
        let mut config = ServiceConfig::default();
        config.gateway = ProviderConfig::InMemory(InMemoryConfig::default());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_above_receive_limit_is_invalid() {
        let mut config = ServiceConfig::default();
        config.retrieval.batch_size = 11;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_zero_request_timeout_is_invalid() {
        let mut config = ServiceConfig::default();
        config.server.timeout_seconds = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref message }) if message.contains("timeout_seconds")
        ));
    }

    #[test]
    fn test_zero_refresh_interval_is_invalid() {
        let mut config = ServiceConfig::default();
        config.directory.refresh_interval_minutes = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_refresh_interval_is_invalid() {
        let mut config = ServiceConfig::default();
        config.directory.refresh_interval_minutes = u64::MAX;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref message }) if message.contains("at most")
        ));
    }

    #[test]
    fn test_huge_refresh_interval_converts_without_overflow() {
        let settings = DirectorySettings {
            refresh_interval_minutes: u64::MAX,
            ..DirectorySettings::default()
        };

        let directory = settings.to_directory_config();

        assert_eq!(directory.refresh_interval, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_long_wait_time_is_invalid() {
        let mut config = ServiceConfig::default();
        config.retrieval.wait_time_seconds = 21;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_delay_above_max_is_invalid() {
        let mut config = ServiceConfig::default();
        config.directory.retry.initial_delay_ms = 90_000;

        assert!(config.validate().is_err());
    }
}

// ============================================================================
// Loading
// ============================================================================

mod loading_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_load_without_sources_uses_defaults() {
        let _guard = EnvGuard::set(&[]);

        let config = ServiceConfig::load().unwrap();

        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_reads_explicit_file() {
        let file = write_yaml(
            r#"
server:
  port: 9191
  enable_cors: false
gateway:
  provider: in_memory
  queues: [orders, orders-dlq]
  redrive_links:
    - source: orders
      dead_letter_queue: orders-dlq
directory:
  refresh_interval_minutes: 5
  retry:
    max_retries: 3
logging:
  json_format: true
"#,
        );
        let path = file.path().to_string_lossy().into_owned();
        let _guard = EnvGuard::set(&[(CONFIG_FILE_ENV, &path)]);

        let config = ServiceConfig::load().unwrap();

        assert_eq!(config.server.port, 9191);
        assert!(!config.server.enable_cors);
        assert_eq!(config.directory.refresh_interval_minutes, 5);
        assert_eq!(config.directory.retry.max_retries, Some(3));
        assert!(config.logging.json_format);
        match config.gateway {
            ProviderConfig::InMemory(memory) => {
                assert_eq!(memory.queues, vec!["orders", "orders-dlq"]);
                assert_eq!(memory.redrive_links.len(), 1);
            }
            other => panic!("unexpected gateway: {:?}", other),
        }
        assert_eq!(config.retrieval, RetrievalSettings::default());
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let file = write_yaml("server:\n  port: 9191\n");
        let path = file.path().to_string_lossy().into_owned();
        let _guard = EnvGuard::set(&[
            (CONFIG_FILE_ENV, &path),
            ("DLQ__SERVER__PORT", "9292"),
            ("DLQ__RETRIEVAL__BATCH_SIZE", "5"),
        ]);

        let config = ServiceConfig::load().unwrap();

        assert_eq!(config.server.port, 9292);
        assert_eq!(config.retrieval.batch_size, 5);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let _guard = EnvGuard::set(&[(CONFIG_FILE_ENV, "/nonexistent/dlq-console.yaml")]);

        let error = ServiceConfig::load().unwrap_err();

        assert!(matches!(error, ConfigError::Loading(_)));
    }

    #[test]
    #[serial]
    fn test_invalid_values_fail_validation() {
        let file = write_yaml("retrieval:\n  batch_size: 50\n");
        let path = file.path().to_string_lossy().into_owned();
        let _guard = EnvGuard::set(&[(CONFIG_FILE_ENV, &path)]);

        let error = ServiceConfig::load().unwrap_err();

        assert!(matches!(error, ConfigError::Invalid { .. }));
    }
}
