//! # DLQ Console Core
//!
//! Domain logic behind the dead-letter-queue console.
//!
//! - [`directory`] keeps a background-refreshed snapshot of every known queue
//! - [`retrieval`] pages through a queue's messages against its approximate count
//! - [`redrive`] republishes dead-lettered messages to their source queues
//! - [`console`] is the facade request handlers call
//!
//! All network access goes through [`dlq_runtime::QueueGateway`], so every
//! component here can be exercised with an in-memory or hand-written gateway.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dlq_console_core::{DirectoryConfig, DlqConsole, QueueConsole, RetrievalConfig};
//! use dlq_runtime::InMemoryGateway;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), dlq_console_core::ConsoleError> {
//! let gateway = Arc::new(InMemoryGateway::new());
//! let console = DlqConsole::new(gateway, DirectoryConfig::default(), RetrievalConfig::default());
//! console.directory().refresh().await.ok();
//!
//! let listing = console.list_queues(1, 10, "orders").await?;
//! println!("{} matching queues", listing.total);
//! # Ok(())
//! # }
//! ```

use dlq_runtime::{AttributeMap, GatewayError, OutboundMessage, QueueLocator, ReceiptHandle, ReceivedMessage};
use serde::{Deserialize, Serialize};

pub mod console;
pub mod directory;
pub mod redrive;
pub mod refresh;
pub mod retrieval;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use console::{DlqConsole, QueueConsole};
pub use directory::{
    DirectoryConfig, DirectorySnapshot, DirectoryState, QueueDirectory, RefreshError,
};
pub use redrive::{RedriveOrchestrator, RedriveReport, RedriveStep};
pub use refresh::{RefreshHandle, RefreshTask};
pub use retrieval::{MessageRetriever, RetrievalConfig};
pub use retry::{Backoff, RetryPolicy};

/// Standard result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Page size used when a caller asks for less than one item per page
pub const DEFAULT_PAGE_SIZE: u64 = 10;

// ============================================================================
// Domain Types
// ============================================================================

/// A queue known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    #[serde(rename = "url")]
    pub locator: QueueLocator,
}

impl Queue {
    /// Build a queue entry, deriving the name from the locator
    pub fn from_locator(locator: QueueLocator) -> Self {
        Self {
            name: locator.queue_name().to_string(),
            locator,
        }
    }
}

/// Read model for queue listings
///
/// `message_count` is the service's approximate count, or `-1` when the count
/// could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub url: QueueLocator,
    pub name: String,
    pub message_count: i64,
}

impl QueueInfo {
    /// Sentinel count for queues whose count could not be read
    pub const UNKNOWN_COUNT: i64 = -1;

    pub fn new(queue: &Queue, message_count: i64) -> Self {
        Self {
            url: queue.locator.clone(),
            name: queue.name.clone(),
            message_count,
        }
    }
}

/// One page of the queue listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueListing {
    pub queues: Vec<QueueInfo>,
    /// Size of the filtered set, not of this page
    pub total: usize,
    pub page: u64,
    pub size: u64,
}

/// A message as fetched from a queue
///
/// Messages are transient views; they are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: ReceiptHandle,
    pub attributes: AttributeMap,
    pub system_attributes: AttributeMap,
}

impl Message {
    /// Copy of this message suitable for publishing elsewhere
    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage::new(self.body.clone())
            .with_attributes(self.attributes.clone())
            .with_system_attributes(self.system_attributes.clone())
    }
}

impl From<ReceivedMessage> for Message {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            message_id: message.message_id,
            body: message.body,
            receipt_handle: message.receipt_handle,
            attributes: message.attributes,
            system_attributes: message.system_attributes,
        }
    }
}

/// Result of a message fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    /// Distinct messages in first-seen order
    pub messages: Vec<Message>,
    /// The count the service reported before fetching, not `messages.len()`
    pub approximate_total: u64,
}

impl MessagePage {
    pub fn find(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.message_id == message_id)
    }
}

/// Normalize 1-indexed paging input: `page < 1` becomes 1, `size < 1` becomes
/// [`DEFAULT_PAGE_SIZE`]
pub fn normalize_paging(page: i64, size: i64) -> (u64, u64) {
    let page = if page < 1 { 1 } else { page as u64 };
    let size = if size < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        size as u64
    };
    (page, size)
}

// ============================================================================
// Error Types
// ============================================================================

/// Coarse error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Queue or message absent
    NotFound,
    /// The queue service failed or was unreachable
    GatewayFailure,
    /// The operation's preconditions do not hold
    Precondition,
    /// The operation is not supported
    Unimplemented,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::GatewayFailure => "gateway_failure",
            Self::Precondition => "precondition",
            Self::Unimplemented => "unimplemented",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by console operations
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message {message_id} not found on queue {queue_name}")]
    MessageNotFound {
        queue_name: String,
        message_id: String,
    },

    #[error("Message count unavailable for queue {queue_name}: {source}")]
    CountUnavailable {
        queue_name: String,
        #[source]
        source: GatewayError,
    },

    #[error("Gateway call {operation} failed for queue {queue_name}: {source}")]
    Gateway {
        operation: &'static str,
        queue_name: String,
        #[source]
        source: GatewayError,
    },

    #[error("No queues redrive into {queue_name}")]
    NoRedriveQueues { queue_name: String },

    #[error(
        "Redrive of message {} from {} is incomplete: {source}",
        .report.message_id,
        .report.queue_name
    )]
    RedriveIncomplete {
        report: Box<RedriveReport>,
        #[source]
        source: GatewayError,
    },

    #[error("{operation} is not implemented")]
    Unimplemented { operation: String },
}

impl ConsoleError {
    /// Category of this error
    ///
    /// A gateway reporting a missing queue means the directory snapshot is
    /// stale, which callers see as not found.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueNotFound { .. } | Self::MessageNotFound { .. } => ErrorKind::NotFound,
            Self::Gateway {
                source: GatewayError::QueueNotFound { .. },
                ..
            } => ErrorKind::NotFound,
            Self::CountUnavailable { .. } | Self::Gateway { .. } => ErrorKind::GatewayFailure,
            Self::RedriveIncomplete { .. } => ErrorKind::GatewayFailure,
            Self::NoRedriveQueues { .. } => ErrorKind::Precondition,
            Self::Unimplemented { .. } => ErrorKind::Unimplemented,
        }
    }

    /// Partial progress of a failed redrive, if this error carries one
    pub fn redrive_report(&self) -> Option<&RedriveReport> {
        match self {
            Self::RedriveIncomplete { report, .. } => Some(report),
            _ => None,
        }
    }

    pub(crate) fn gateway(
        operation: &'static str,
        queue_name: impl Into<String>,
        source: GatewayError,
    ) -> Self {
        Self::Gateway {
            operation,
            queue_name: queue_name.into(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
