//! Message types for gateway operations including queue locators and attribute maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Queue Locator
// ============================================================================

/// Opaque address of a queue as reported by the queue service (URL or ARN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueLocator(String);

impl QueueLocator {
    /// Wrap a locator string returned by the queue service
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Get locator as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the queue name from the locator
    ///
    /// The name is the last `/`-separated segment, which is how SQS queue URLs
    /// (`https://sqs.{region}.amazonaws.com/{account}/{name}`) encode it.
    pub fn queue_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for QueueLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Receipt Handle
// ============================================================================

/// Single-use token authorising deletion of one received message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Attribute Map
// ============================================================================

/// String-valued message attributes keyed by attribute name
///
/// Ordered by key so that request parameters built from it are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, String>);

impl AttributeMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of this map with empty-string values removed
    ///
    /// The queue service rejects attributes without a value, so every gateway
    /// applies this before transmitting attributes.
    pub fn without_empty_values(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A message as returned by a receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: ReceiptHandle,
    /// User-defined message attributes
    pub attributes: AttributeMap,
    /// Service-maintained attributes (group id, deduplication id, ...)
    pub system_attributes: AttributeMap,
}

/// A message to be published to a queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: AttributeMap,
    pub system_attributes: AttributeMap,
}

impl OutboundMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_system_attributes(mut self, system_attributes: AttributeMap) -> Self {
        self.system_attributes = system_attributes;
        self
    }
}

impl From<&ReceivedMessage> for OutboundMessage {
    fn from(message: &ReceivedMessage) -> Self {
        Self {
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            system_attributes: message.system_attributes.clone(),
        }
    }
}

// ============================================================================
// Request / Response Shapes
// ============================================================================

/// Maximum messages a single receive call may return
pub const MAX_RECEIVE_BATCH: u32 = 10;

/// Parameters for a bounded receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Upper bound on returned messages (clamped to [`MAX_RECEIVE_BATCH`])
    pub max_messages: u32,
    /// How long received messages stay hidden from other receivers
    pub visibility_timeout: Duration,
    /// How long the service may wait for messages to arrive
    pub wait_time: Duration,
    /// Message attribute names to return (`All` for every attribute)
    pub message_attribute_names: Vec<String>,
    /// System attribute names to return
    pub system_attribute_names: Vec<String>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_RECEIVE_BATCH,
            visibility_timeout: Duration::from_secs(3),
            wait_time: Duration::from_secs(1),
            message_attribute_names: vec!["All".to_string()],
            system_attribute_names: vec![
                "MessageDeduplicationId".to_string(),
                "MessageGroupId".to_string(),
            ],
        }
    }
}

impl ReceiveOptions {
    /// Effective batch size after applying the service limit
    pub fn batch_size(&self) -> u32 {
        self.max_messages.clamp(1, MAX_RECEIVE_BATCH)
    }
}

/// One page of queue locators plus the continuation token for the next page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueuePage {
    pub locators: Vec<QueueLocator>,
    pub next_token: Option<String>,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
