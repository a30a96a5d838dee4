//! # Message Retrieval
//!
//! Reads a queue's messages by receiving in bounded batches until the
//! approximate count reported up front is covered.
//!
//! Receiving hides each message for a short visibility timeout so parallel
//! fetches mostly see different messages, but the service may still deliver
//! the same message twice. Results are deduplicated by message id.

use crate::directory::QueueDirectory;
use crate::{ConsoleError, ConsoleResult, Message, MessagePage, Queue};
use dlq_runtime::message::MAX_RECEIVE_BATCH;
use dlq_runtime::ReceiveOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "retrieval_tests.rs"]
mod tests;

/// Settings for each receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub batch_size: u32,
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
    pub message_attribute_names: Vec<String>,
    pub system_attribute_names: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let defaults = ReceiveOptions::default();
        Self {
            batch_size: MAX_RECEIVE_BATCH,
            visibility_timeout: defaults.visibility_timeout,
            wait_time: defaults.wait_time,
            message_attribute_names: defaults.message_attribute_names,
            system_attribute_names: defaults.system_attribute_names,
        }
    }
}

impl RetrievalConfig {
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.batch_size,
            visibility_timeout: self.visibility_timeout,
            wait_time: self.wait_time,
            message_attribute_names: self.message_attribute_names.clone(),
            system_attribute_names: self.system_attribute_names.clone(),
        }
    }
}

/// Fetches and deduplicates the messages on a queue
pub struct MessageRetriever {
    directory: Arc<QueueDirectory>,
    config: RetrievalConfig,
}

impl MessageRetriever {
    pub fn new(directory: Arc<QueueDirectory>, config: RetrievalConfig) -> Self {
        Self { directory, config }
    }

    /// Resolve the queue by name and fetch its messages
    pub async fn fetch_messages(&self, queue_name: &str) -> ConsoleResult<MessagePage> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        self.fetch_from(&queue).await
    }

    /// Fetch every message on an already resolved queue
    ///
    /// Any gateway failure aborts the fetch; no partial result is returned.
    #[instrument(skip(self, queue), fields(queue_name = %queue.name))]
    pub async fn fetch_from(&self, queue: &Queue) -> ConsoleResult<MessagePage> {
        let gateway = self.directory.gateway();

        let approximate_total = gateway
            .get_approximate_message_count(&queue.locator)
            .await
            .map_err(|source| ConsoleError::CountUnavailable {
                queue_name: queue.name.clone(),
                source,
            })?;

        let options = self.config.receive_options();
        let mut raw: Vec<Message> = Vec::new();
        let mut receive_calls = 0u32;

        while (raw.len() as u64) < approximate_total {
            let batch = gateway
                .receive_messages(&queue.locator, &options)
                .await
                .map_err(|source| ConsoleError::gateway("ReceiveMessage", &queue.name, source))?;
            receive_calls += 1;

            if batch.is_empty() {
                break;
            }
            raw.extend(batch.into_iter().map(Message::from));
        }

        let raw_count = raw.len();
        let messages = dedup_by_id(raw);

        debug!(
            approximate_total,
            raw_count,
            distinct = messages.len(),
            receive_calls,
            "Fetched messages"
        );

        Ok(MessagePage {
            messages,
            approximate_total,
        })
    }
}

/// Keep one message per id at its first-seen position
///
/// Each receive issues a new receipt handle and invalidates the previous one,
/// so a repeated message carries the handle from its latest copy.
fn dedup_by_id(messages: Vec<Message>) -> Vec<Message> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(messages.len());
    let mut distinct: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match positions.get(&message.message_id).copied() {
            Some(index) => distinct[index].receipt_handle = message.receipt_handle,
            None => {
                positions.insert(message.message_id.clone(), distinct.len());
                distinct.push(message);
            }
        }
    }

    distinct
}
