//! # DLQ Runtime
//!
//! Gateway to the queue service used by the DLQ console.
//!
//! This library provides:
//! - The provider-agnostic [`QueueGateway`] contract (list, count, receive,
//!   delete, purge, redrive-source lookup, send)
//! - An AWS SQS implementation speaking the SQS query API over HTTP
//! - An in-memory implementation for development and tests
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all gateway operations
//! - [`message`] - Locators, attribute maps, received and outbound messages
//! - [`provider`] - Provider selection and configuration
//! - [`gateway`] - The gateway trait and factory
//! - [`providers`] - Concrete gateway implementations

pub mod error;
pub mod gateway;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use error::{ConfigurationError, GatewayError};
pub use gateway::{create_gateway, QueueGateway};
pub use message::{
    AttributeMap, OutboundMessage, QueueLocator, QueuePage, ReceiptHandle, ReceiveOptions,
    ReceivedMessage,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderConfig, ProviderType};
pub use providers::{AwsSqsGateway, InMemoryGateway};
