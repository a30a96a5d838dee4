//! In-memory queue gateway for testing and development.
//!
//! Behaves like the real service where the console can observe it:
//! - Received messages stay hidden for the visibility timeout
//! - Every receive issues a fresh receipt handle and invalidates the old one
//! - The approximate count is the number of currently visible messages
//! - Redrive relationships are declared explicitly
//!
//! Long polling is not simulated; receives return immediately.

use crate::error::GatewayError;
use crate::gateway::QueueGateway;
use crate::message::{
    AttributeMap, OutboundMessage, QueueLocator, QueuePage, ReceiptHandle, ReceiveOptions,
    ReceivedMessage,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const LOCATOR_PREFIX: &str = "memory://queues/";
const ALL_ATTRIBUTES: &str = "All";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues, in creation order
#[derive(Default)]
struct QueueStorage {
    order: Vec<QueueLocator>,
    queues: HashMap<QueueLocator, InMemoryQueue>,
    /// Dead-letter queue -> queues that redrive into it
    redrive_sources: HashMap<QueueLocator, Vec<QueueLocator>>,
    receipt_counter: u64,
}

impl QueueStorage {
    fn queue_mut(&mut self, locator: &QueueLocator) -> Result<&mut InMemoryQueue, GatewayError> {
        self.queues
            .get_mut(locator)
            .ok_or_else(|| GatewayError::QueueNotFound {
                queue: locator.to_string(),
            })
    }

    fn queue(&self, locator: &QueueLocator) -> Result<&InMemoryQueue, GatewayError> {
        self.queues
            .get(locator)
            .ok_or_else(|| GatewayError::QueueNotFound {
                queue: locator.to_string(),
            })
    }
}

#[derive(Default)]
struct InMemoryQueue {
    messages: VecDeque<StoredMessage>,
}

#[derive(Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    attributes: AttributeMap,
    system_attributes: AttributeMap,
    visible_at: Instant,
    /// Receipt from the most recent receive, if any
    receipt: Option<String>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        now >= self.visible_at
    }
}

/// Keep only the attributes a receive asked for
fn select_attributes(attributes: &AttributeMap, names: &[String]) -> AttributeMap {
    if names.iter().any(|n| n == ALL_ATTRIBUTES) {
        return attributes.clone();
    }

    attributes
        .iter()
        .filter(|(key, _)| names.iter().any(|n| n == key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// In-Memory Gateway
// ============================================================================

/// In-memory queue gateway
pub struct InMemoryGateway {
    storage: RwLock<QueueStorage>,
}

impl InMemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self {
            storage: RwLock::new(QueueStorage::default()),
        }
    }

    /// Create a gateway with the queues and redrive links from configuration
    pub fn from_config(config: &InMemoryConfig) -> Self {
        let gateway = Self::new();
        for name in &config.queues {
            gateway.create_queue(name);
        }
        for link in &config.redrive_links {
            let source = gateway.create_queue(&link.source);
            let dead_letter_queue = gateway.create_queue(&link.dead_letter_queue);
            gateway.add_redrive_source(&dead_letter_queue, &source);
        }
        gateway
    }

    /// Locator the gateway uses for a queue name
    pub fn locator_for(name: &str) -> QueueLocator {
        QueueLocator::new(format!("{}{}", LOCATOR_PREFIX, name))
    }

    /// Create a queue if it does not exist yet and return its locator
    pub fn create_queue(&self, name: &str) -> QueueLocator {
        let locator = Self::locator_for(name);
        let mut storage = self.write();
        if !storage.queues.contains_key(&locator) {
            storage.order.push(locator.clone());
            storage
                .queues
                .insert(locator.clone(), InMemoryQueue::default());
        }
        locator
    }

    /// Remove a queue and every redrive link that mentions it
    pub fn delete_queue(&self, queue: &QueueLocator) {
        let mut storage = self.write();
        storage.order.retain(|l| l != queue);
        storage.queues.remove(queue);
        storage.redrive_sources.remove(queue);
        for sources in storage.redrive_sources.values_mut() {
            sources.retain(|l| l != queue);
        }
    }

    /// Declare that `source` redrives failed messages into `dead_letter_queue`
    pub fn add_redrive_source(&self, dead_letter_queue: &QueueLocator, source: &QueueLocator) {
        let mut storage = self.write();
        let sources = storage
            .redrive_sources
            .entry(dead_letter_queue.clone())
            .or_default();
        if !sources.contains(source) {
            sources.push(source.clone());
        }
    }

    /// Enqueue a message directly, returning its message id
    pub fn seed_message(
        &self,
        queue: &QueueLocator,
        message: OutboundMessage,
    ) -> Result<String, GatewayError> {
        let message_id = uuid::Uuid::new_v4().to_string();
        let stored = StoredMessage {
            message_id: message_id.clone(),
            body: message.body,
            attributes: message.attributes.without_empty_values(),
            system_attributes: message.system_attributes.without_empty_values(),
            visible_at: Instant::now(),
            receipt: None,
        };

        self.write().queue_mut(queue)?.messages.push_back(stored);
        Ok(message_id)
    }

    /// Bodies of every message on the queue, visible or not, in queue order
    pub fn message_bodies(&self, queue: &QueueLocator) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .read()
            .queue(queue)?
            .messages
            .iter()
            .map(|m| m.body.clone())
            .collect())
    }

    /// Attributes of every message on the queue as `(attributes, system_attributes)`
    pub fn message_attributes(
        &self,
        queue: &QueueLocator,
    ) -> Result<Vec<(AttributeMap, AttributeMap)>, GatewayError> {
        Ok(self
            .read()
            .queue(queue)?
            .messages
            .iter()
            .map(|m| (m.attributes.clone(), m.system_attributes.clone()))
            .collect())
    }

    fn read(&self) -> RwLockReadGuard<'_, QueueStorage> {
        self.storage.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, QueueStorage> {
        self.storage.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice `items` into a page, using the start offset as the continuation token
fn paginate(items: &[QueueLocator], max_results: usize, next_token: Option<&str>) -> QueuePage {
    let start = next_token
        .and_then(|t| t.parse::<usize>().ok())
        .unwrap_or(0)
        .min(items.len());
    let end = start.saturating_add(max_results.max(1)).min(items.len());

    QueuePage {
        locators: items[start..end].to_vec(),
        next_token: (end < items.len()).then(|| end.to_string()),
    }
}

#[async_trait]
impl QueueGateway for InMemoryGateway {
    async fn list_queues(
        &self,
        name_prefix: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        let storage = self.read();
        let matching: Vec<QueueLocator> = storage
            .order
            .iter()
            .filter(|l| name_prefix.map_or(true, |p| l.queue_name().starts_with(p)))
            .cloned()
            .collect();

        Ok(paginate(&matching, max_results as usize, next_token))
    }

    async fn get_approximate_message_count(
        &self,
        queue: &QueueLocator,
    ) -> Result<u64, GatewayError> {
        let now = Instant::now();
        let storage = self.read();
        let visible = storage
            .queue(queue)?
            .messages
            .iter()
            .filter(|m| m.is_visible(now))
            .count();
        Ok(visible as u64)
    }

    async fn receive_messages(
        &self,
        queue: &QueueLocator,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, GatewayError> {
        let now = Instant::now();
        let limit = options.batch_size() as usize;
        let mut storage = self.write();
        let mut counter = storage.receipt_counter;
        let queue_state = storage.queue_mut(queue)?;

        let mut received = Vec::new();
        for stored in queue_state
            .messages
            .iter_mut()
            .filter(|m| m.is_visible(now))
            .take(limit)
        {
            counter += 1;
            let receipt = format!("{}#{}", stored.message_id, counter);
            stored.receipt = Some(receipt.clone());
            stored.visible_at = now + options.visibility_timeout;

            received.push(ReceivedMessage {
                message_id: stored.message_id.clone(),
                body: stored.body.clone(),
                receipt_handle: ReceiptHandle::new(receipt),
                attributes: select_attributes(&stored.attributes, &options.message_attribute_names),
                system_attributes: select_attributes(
                    &stored.system_attributes,
                    &options.system_attribute_names,
                ),
            });
        }

        storage.receipt_counter = counter;
        Ok(received)
    }

    async fn delete_message(
        &self,
        queue: &QueueLocator,
        receipt: &ReceiptHandle,
    ) -> Result<(), GatewayError> {
        let mut storage = self.write();
        let queue_state = storage.queue_mut(queue)?;

        let position = queue_state
            .messages
            .iter()
            .position(|m| m.receipt.as_deref() == Some(receipt.as_str()))
            .ok_or_else(|| GatewayError::ReceiptInvalid {
                receipt: receipt.to_string(),
            })?;
        queue_state.messages.remove(position);
        Ok(())
    }

    async fn purge_queue(&self, queue: &QueueLocator) -> Result<(), GatewayError> {
        self.write().queue_mut(queue)?.messages.clear();
        Ok(())
    }

    async fn list_redrive_sources(
        &self,
        queue: &QueueLocator,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        let storage = self.read();
        storage.queue(queue)?;
        let sources = storage
            .redrive_sources
            .get(queue)
            .cloned()
            .unwrap_or_default();

        Ok(paginate(
            &sources,
            ProviderType::InMemory.max_list_page_size() as usize,
            next_token,
        ))
    }

    async fn send_message(
        &self,
        queue: &QueueLocator,
        message: &OutboundMessage,
    ) -> Result<(), GatewayError> {
        self.seed_message(queue, message.clone())?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
