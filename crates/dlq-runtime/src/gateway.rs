//! The gateway contract the console depends on, plus the gateway factory.

use crate::error::GatewayError;
use crate::message::{OutboundMessage, QueueLocator, QueuePage, ReceiptHandle, ReceiveOptions, ReceivedMessage};
use crate::provider::{ProviderConfig, ProviderType};
use crate::providers::{AwsSqsGateway, InMemoryGateway};
use async_trait::async_trait;
use std::sync::Arc;

/// Network API of the queue service, reduced to the calls the console needs
///
/// Every method is a single round trip; implementations do not retry.
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// List one page of queue locators, optionally filtered by name prefix
    async fn list_queues(
        &self,
        name_prefix: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError>;

    /// Read the service's approximate count of visible messages
    async fn get_approximate_message_count(
        &self,
        queue: &QueueLocator,
    ) -> Result<u64, GatewayError>;

    /// Receive up to `options.max_messages` messages, hiding them for the
    /// visibility timeout
    async fn receive_messages(
        &self,
        queue: &QueueLocator,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, GatewayError>;

    /// Delete a received message using its receipt handle
    async fn delete_message(
        &self,
        queue: &QueueLocator,
        receipt: &ReceiptHandle,
    ) -> Result<(), GatewayError>;

    /// Request removal of every message on the queue
    async fn purge_queue(&self, queue: &QueueLocator) -> Result<(), GatewayError>;

    /// List one page of queues whose redrive policy targets `queue`
    async fn list_redrive_sources(
        &self,
        queue: &QueueLocator,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError>;

    /// Publish a message; empty attribute values are dropped before sending
    async fn send_message(
        &self,
        queue: &QueueLocator,
        message: &OutboundMessage,
    ) -> Result<(), GatewayError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Create a gateway from configuration
pub fn create_gateway(config: &ProviderConfig) -> Result<Arc<dyn QueueGateway>, GatewayError> {
    let gateway: Arc<dyn QueueGateway> = match config {
        ProviderConfig::AwsSqs(sqs_config) => Arc::new(AwsSqsGateway::new(sqs_config.clone())?),
        ProviderConfig::InMemory(memory_config) => {
            Arc::new(InMemoryGateway::from_config(memory_config))
        }
    };

    Ok(gateway)
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
