//! The operations request handlers call.
//!
//! [`QueueConsole`] is the seam between the HTTP layer and the core;
//! [`DlqConsole`] wires the directory, retriever and orchestrator together
//! over one gateway.

use crate::directory::{DirectoryConfig, DirectoryState, QueueDirectory};
use crate::redrive::{RedriveOrchestrator, RedriveReport};
use crate::retrieval::{MessageRetriever, RetrievalConfig};
use crate::{ConsoleError, ConsoleResult, MessagePage, Queue, QueueListing};
use async_trait::async_trait;
use dlq_runtime::QueueGateway;
use std::sync::Arc;
use tracing::{info, instrument};

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;

/// Console operations exposed to request handlers
#[async_trait]
pub trait QueueConsole: Send + Sync {
    /// One page of queues matching `search`, with live message counts
    async fn list_queues(&self, page: i64, size: i64, search: &str) -> ConsoleResult<QueueListing>;

    /// Every message on the queue plus the count reported before fetching
    async fn fetch_messages(&self, queue_name: &str) -> ConsoleResult<MessagePage>;

    /// Delete the message with the given id
    async fn delete_message(&self, queue_name: &str, message_id: &str) -> ConsoleResult<()>;

    /// Request a purge; completion is not awaited
    async fn purge_queue(&self, queue_name: &str) -> ConsoleResult<()>;

    /// Queues whose redrive policy targets this queue
    async fn list_redrive_sources(&self, queue_name: &str) -> ConsoleResult<Vec<Queue>>;

    /// Republish one message to every source queue and delete the original
    async fn retry_message(&self, queue_name: &str, message_id: &str)
        -> ConsoleResult<RedriveReport>;

    /// Bulk redrive; always fails with an unimplemented error once the
    /// queue and its sources are confirmed
    async fn retry_all_messages(&self, queue_name: &str) -> ConsoleResult<()>;

    /// State of the queue directory
    async fn directory_state(&self) -> DirectoryState;
}

/// Production console backed by a [`QueueGateway`]
pub struct DlqConsole {
    directory: Arc<QueueDirectory>,
    retriever: Arc<MessageRetriever>,
    orchestrator: RedriveOrchestrator,
}

impl DlqConsole {
    pub fn new(
        gateway: Arc<dyn QueueGateway>,
        directory_config: DirectoryConfig,
        retrieval_config: RetrievalConfig,
    ) -> Self {
        let directory = Arc::new(QueueDirectory::new(gateway, directory_config));
        let retriever = Arc::new(MessageRetriever::new(
            Arc::clone(&directory),
            retrieval_config,
        ));
        let orchestrator = RedriveOrchestrator::new(Arc::clone(&directory), Arc::clone(&retriever));

        Self {
            directory,
            retriever,
            orchestrator,
        }
    }

    /// Shared directory, e.g. for spawning the refresh task
    pub fn directory(&self) -> &Arc<QueueDirectory> {
        &self.directory
    }
}

#[async_trait]
impl QueueConsole for DlqConsole {
    async fn list_queues(&self, page: i64, size: i64, search: &str) -> ConsoleResult<QueueListing> {
        Ok(self.directory.list(page, size, search).await)
    }

    async fn fetch_messages(&self, queue_name: &str) -> ConsoleResult<MessagePage> {
        self.retriever.fetch_messages(queue_name).await
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, queue_name: &str, message_id: &str) -> ConsoleResult<()> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        let page = self.retriever.fetch_from(&queue).await?;
        let message = page
            .find(message_id)
            .ok_or_else(|| ConsoleError::MessageNotFound {
                queue_name: queue_name.to_string(),
                message_id: message_id.to_string(),
            })?;

        self.directory
            .gateway()
            .delete_message(&queue.locator, &message.receipt_handle)
            .await
            .map_err(|source| ConsoleError::gateway("DeleteMessage", queue_name, source))?;

        info!("Message deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge_queue(&self, queue_name: &str) -> ConsoleResult<()> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        self.directory
            .gateway()
            .purge_queue(&queue.locator)
            .await
            .map_err(|source| ConsoleError::gateway("PurgeQueue", queue_name, source))?;

        info!("Queue purge requested");
        Ok(())
    }

    async fn list_redrive_sources(&self, queue_name: &str) -> ConsoleResult<Vec<Queue>> {
        self.orchestrator.list_redrive_sources(queue_name).await
    }

    async fn retry_message(
        &self,
        queue_name: &str,
        message_id: &str,
    ) -> ConsoleResult<RedriveReport> {
        self.orchestrator.retry_message(queue_name, message_id).await
    }

    async fn retry_all_messages(&self, queue_name: &str) -> ConsoleResult<()> {
        self.orchestrator.retry_all_messages(queue_name).await
    }

    async fn directory_state(&self) -> DirectoryState {
        self.directory.state().await
    }
}
