//! Response types and query parameters for the API.

use chrono::{DateTime, Utc};
use dlq_console_core::{DirectoryState, Message, Queue};
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Types
// ============================================================================

/// Messages currently on a queue
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
    /// Approximate count reported by the queue service before fetching
    pub total: u64,
}

/// Queues that redrive into a dead-letter queue
#[derive(Debug, Serialize)]
pub struct SourceListResponse {
    pub sources: Vec<Queue>,
}

/// Acknowledgement for delete and purge requests
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub status: String,
    pub queue_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub directory: DirectoryState,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters for the queue listing
///
/// Paging values are kept as strings so a malformed value is treated as
/// absent instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQueuesParams {
    pub page: Option<String>,
    pub size: Option<String>,
    pub search: Option<String>,
}

impl ListQueuesParams {
    /// Raw page and size; absent or unparseable values become 0, which the
    /// directory normalizes to its defaults
    pub fn paging(&self) -> (i64, i64) {
        (parse_or_zero(self.page.as_deref()), parse_or_zero(self.size.as_deref()))
    }

    pub fn search(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

fn parse_or_zero(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
