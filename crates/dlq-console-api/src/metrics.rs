//! Prometheus metrics for the API service.
//!
//! Metrics live in a registry owned by [`ApiMetrics`] rather than the
//! process-global default registry, so several routers can coexist in one
//! process (as they do in tests).

use dlq_console_core::DirectoryState;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Outcome label values for redrive requests
pub mod redrive_outcome {
    pub const COMPLETE: &str = "complete";
    pub const INCOMPLETE: &str = "incomplete";
    pub const REJECTED: &str = "rejected";
}

/// Service metrics for observability
#[derive(Debug)]
pub struct ApiMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    // Redrive metrics
    pub redrive_total: IntCounterVec,

    // Directory metrics, refreshed on scrape
    pub directory_queue_count: IntGauge,
    pub directory_generation: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
            &["method", "path"],
        )?;
        let redrive_total = IntCounterVec::new(
            Opts::new("redrive_requests_total", "Single-message redrives by outcome"),
            &["outcome"],
        )?;
        let directory_queue_count = IntGauge::new(
            "directory_queue_count",
            "Queues in the current directory snapshot",
        )?;
        let directory_generation = IntGauge::new(
            "directory_generation",
            "Generation of the current directory snapshot",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(redrive_total.clone()))?;
        registry.register(Box::new(directory_queue_count.clone()))?;
        registry.register(Box::new(directory_generation.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            redrive_total,
            directory_queue_count,
            directory_generation,
        }))
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    pub fn record_redrive(&self, outcome: &str) {
        self.redrive_total.with_label_values(&[outcome]).inc();
    }

    pub fn update_directory(&self, state: &DirectoryState) {
        match state {
            DirectoryState::Empty => {
                self.directory_queue_count.set(0);
                self.directory_generation.set(0);
            }
            DirectoryState::Populated {
                generation,
                queue_count,
                ..
            } => {
                self.directory_queue_count
                    .set(i64::try_from(*queue_count).unwrap_or(i64::MAX));
                self.directory_generation
                    .set(i64::try_from(*generation).unwrap_or(i64::MAX));
            }
        }
    }

    /// Render every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
