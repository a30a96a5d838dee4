//! Queue gateway implementations.
//!
//! This module contains concrete implementations of the `QueueGateway` trait
//! for different queue backends.

pub mod aws;
pub mod memory;

pub use aws::AwsSqsGateway;
pub use memory::InMemoryGateway;
