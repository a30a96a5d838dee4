//! # Queue Directory
//!
//! Cached, periodically refreshed list of every queue the service knows about.
//!
//! The directory holds one immutable [`DirectorySnapshot`] behind an `Arc`.
//! A refresh builds a complete replacement off to the side and swaps the `Arc`
//! under the write lock, so readers always see one whole generation. Readers
//! clone the `Arc` and drop the lock before doing any network I/O.
//!
//! A queue deleted from the service stays in the directory until the next
//! refresh; operations on it then fail at the gateway.

use crate::retry::{Backoff, RetryPolicy};
use crate::{normalize_paging, ConsoleError, ConsoleResult, Queue, QueueInfo, QueueListing};
use chrono::{DateTime, Utc};
use dlq_runtime::{GatewayError, QueuePage, QueueGateway};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;

/// Default period between refresh cycles
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120 * 60);

/// Default number of queue locators requested per list call
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 1000;

/// Directory refresh settings
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    pub refresh_interval: Duration,
    pub list_page_size: u32,
    pub retry_policy: RetryPolicy,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// One complete generation of the queue list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub queues: Vec<Queue>,
    /// 0 before the first refresh, then incremented on every swap
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DirectorySnapshot {
    pub fn find(&self, name: &str) -> Option<&Queue> {
        self.queues.iter().find(|q| q.name == name)
    }
}

/// Externally visible state of the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirectoryState {
    /// No refresh has completed yet
    Empty,
    Populated {
        generation: u64,
        queue_count: usize,
        refreshed_at: DateTime<Utc>,
    },
}

/// Why a refresh cycle ended without swapping the snapshot
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Refresh abandoned after {attempts} attempts: {source}")]
    Abandoned {
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    #[error("Refresh cancelled")]
    Cancelled,
}

/// The queue directory cache
pub struct QueueDirectory {
    gateway: Arc<dyn QueueGateway>,
    snapshot: RwLock<Arc<DirectorySnapshot>>,
    config: DirectoryConfig,
}

impl QueueDirectory {
    /// Create an empty directory; nothing is fetched until [`refresh`](Self::refresh)
    pub fn new(gateway: Arc<dyn QueueGateway>, config: DirectoryConfig) -> Self {
        Self {
            gateway,
            snapshot: RwLock::new(Arc::new(DirectorySnapshot::default())),
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn QueueGateway> {
        &self.gateway
    }

    /// Current snapshot; the lock is released before this returns
    pub async fn snapshot(&self) -> Arc<DirectorySnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn state(&self) -> DirectoryState {
        let snapshot = self.snapshot().await;
        match snapshot.refreshed_at {
            None => DirectoryState::Empty,
            Some(refreshed_at) => DirectoryState::Populated {
                generation: snapshot.generation,
                queue_count: snapshot.queues.len(),
                refreshed_at,
            },
        }
    }

    /// Run one refresh cycle that cannot be cancelled
    pub async fn refresh(&self) -> Result<u64, RefreshError> {
        self.refresh_with_cancellation(&CancellationToken::new()).await
    }

    /// Fetch every queue locator and swap in a new snapshot
    ///
    /// Failed page fetches are retried at the same continuation token according
    /// to the configured [`RetryPolicy`]. Returns the new generation.
    #[instrument(skip(self, cancel))]
    pub async fn refresh_with_cancellation(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u64, RefreshError> {
        let mut queues = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self.fetch_page(next_token.as_deref(), cancel).await?;
            queues.extend(page.locators.into_iter().map(Queue::from_locator));

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        let queue_count = queues.len();
        let generation = {
            let mut current = self.snapshot.write().await;
            let generation = current.generation + 1;
            *current = Arc::new(DirectorySnapshot {
                queues,
                generation,
                refreshed_at: Some(Utc::now()),
            });
            generation
        };

        info!(generation, queue_count, "Queue directory refreshed");
        Ok(generation)
    }

    async fn fetch_page(
        &self,
        next_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<QueuePage, RefreshError> {
        let mut backoff = Backoff::new(&self.config.retry_policy);

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
                result = self.gateway.list_queues(None, self.config.list_page_size, next_token) => result,
            };

            let error = match result {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            let attempts = backoff.attempts();
            let Some(delay) = backoff.next_delay() else {
                warn!(
                    attempts,
                    error = %error,
                    "Giving up on queue directory refresh; keeping previous snapshot"
                );
                return Err(RefreshError::Abandoned {
                    attempts,
                    source: error,
                });
            };

            warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                transient = error.is_transient(),
                error = %error,
                "Failed to list queues; retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Find a queue by exact name in the current snapshot
    pub async fn lookup_by_name(&self, name: &str) -> ConsoleResult<Queue> {
        self.snapshot()
            .await
            .find(name)
            .cloned()
            .ok_or_else(|| ConsoleError::QueueNotFound {
                queue_name: name.to_string(),
            })
    }

    /// One page of queues whose name contains `search`, with live counts
    ///
    /// Pages are 1-indexed. A count that cannot be read becomes
    /// [`QueueInfo::UNKNOWN_COUNT`] for that queue only.
    #[instrument(skip(self))]
    pub async fn list(&self, page: i64, size: i64, search: &str) -> QueueListing {
        let (page, size) = normalize_paging(page, size);
        let snapshot = self.snapshot().await;

        let filtered: Vec<&Queue> = snapshot
            .queues
            .iter()
            .filter(|q| search.is_empty() || q.name.contains(search))
            .collect();
        let total = filtered.len();

        let window: Vec<&Queue> = match (page - 1).checked_mul(size) {
            Some(start) if start < total as u64 => filtered
                .into_iter()
                .skip(start as usize)
                .take(size.min(total as u64) as usize)
                .collect(),
            _ => Vec::new(),
        };

        let counts = join_all(window.iter().map(|queue| async move {
            match self.gateway.get_approximate_message_count(&queue.locator).await {
                Ok(count) => i64::try_from(count).unwrap_or(i64::MAX),
                Err(error) => {
                    warn!(queue_name = %queue.name, error = %error, "Failed to get message count");
                    QueueInfo::UNKNOWN_COUNT
                }
            }
        }))
        .await;

        let queues: Vec<QueueInfo> = window
            .iter()
            .zip(counts)
            .map(|(queue, count)| QueueInfo::new(queue, count))
            .collect();

        debug!(returned = queues.len(), total, "Listed queues");
        QueueListing {
            queues,
            total,
            page,
            size,
        }
    }
}
