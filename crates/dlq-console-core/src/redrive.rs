//! # Redrive
//!
//! Moves a dead-lettered message back to every queue that redrives into the
//! dead-letter queue.
//!
//! The original is deleted only after every publish succeeded. A publish
//! failure leaves the original in place, though copies already sent to
//! earlier source queues stay there. A delete failure after all publishes
//! leaves the message duplicated. Both cases are reported through
//! [`RedriveReport`] so callers can tell exactly which steps completed.
//!
//! There is no idempotency key: retrying a redrive whose delete failed
//! publishes the message again.

use crate::directory::QueueDirectory;
use crate::retrieval::MessageRetriever;
use crate::{ConsoleError, ConsoleResult, Queue};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[cfg(test)]
#[path = "redrive_tests.rs"]
mod tests;

/// Step at which a redrive stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RedriveStep {
    Publish {
        #[serde(rename = "queueName")]
        queue_name: String,
    },
    Delete,
}

/// What a single-message redrive did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedriveReport {
    pub queue_name: String,
    pub message_id: String,
    /// Source queues discovered for the dead-letter queue
    pub targets: Vec<Queue>,
    /// Names of the targets that received a copy, in publish order
    pub published_to: Vec<String>,
    pub failed_step: Option<RedriveStep>,
    pub original_deleted: bool,
}

impl RedriveReport {
    fn new(queue_name: &str, message_id: &str, targets: Vec<Queue>) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            message_id: message_id.to_string(),
            targets,
            published_to: Vec::new(),
            failed_step: None,
            original_deleted: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_step.is_none() && self.original_deleted
    }

    /// True when at least one copy exists alongside the undeleted original
    pub fn is_duplicated(&self) -> bool {
        !self.published_to.is_empty() && !self.original_deleted
    }
}

/// Discovers redrive sources and republishes dead-lettered messages
pub struct RedriveOrchestrator {
    directory: Arc<QueueDirectory>,
    retriever: Arc<MessageRetriever>,
}

impl RedriveOrchestrator {
    pub fn new(directory: Arc<QueueDirectory>, retriever: Arc<MessageRetriever>) -> Self {
        Self {
            directory,
            retriever,
        }
    }

    /// Every queue whose redrive policy targets `queue`, across all pages
    pub async fn redrive_sources(&self, queue: &Queue) -> ConsoleResult<Vec<Queue>> {
        let gateway = self.directory.gateway();
        let mut sources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = gateway
                .list_redrive_sources(&queue.locator, next_token.as_deref())
                .await
                .map_err(|source| {
                    ConsoleError::gateway("ListDeadLetterSourceQueues", &queue.name, source)
                })?;
            sources.extend(page.locators.into_iter().map(Queue::from_locator));

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(sources)
    }

    /// Resolve `queue_name` and list its redrive sources
    pub async fn list_redrive_sources(&self, queue_name: &str) -> ConsoleResult<Vec<Queue>> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        self.redrive_sources(&queue).await
    }

    async fn required_sources(&self, queue: &Queue) -> ConsoleResult<Vec<Queue>> {
        let sources = self.redrive_sources(queue).await?;
        if sources.is_empty() {
            return Err(ConsoleError::NoRedriveQueues {
                queue_name: queue.name.clone(),
            });
        }
        Ok(sources)
    }

    /// Publish one message to every source queue, then delete the original
    #[instrument(skip(self))]
    pub async fn retry_message(
        &self,
        queue_name: &str,
        message_id: &str,
    ) -> ConsoleResult<RedriveReport> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        let sources = self.required_sources(&queue).await?;

        let page = self.retriever.fetch_from(&queue).await?;
        let message = page
            .find(message_id)
            .ok_or_else(|| ConsoleError::MessageNotFound {
                queue_name: queue_name.to_string(),
                message_id: message_id.to_string(),
            })?;

        let gateway = self.directory.gateway();
        let outbound = message.to_outbound();
        let mut report = RedriveReport::new(queue_name, message_id, sources.clone());

        for target in &sources {
            if let Err(source) = gateway.send_message(&target.locator, &outbound).await {
                error!(
                    target_queue = %target.name,
                    published = report.published_to.len(),
                    error = %source,
                    "Redrive publish failed; original message kept"
                );
                report.failed_step = Some(RedriveStep::Publish {
                    queue_name: target.name.clone(),
                });
                return Err(ConsoleError::RedriveIncomplete {
                    report: Box::new(report),
                    source,
                });
            }
            report.published_to.push(target.name.clone());
        }

        if let Err(source) = gateway
            .delete_message(&queue.locator, &message.receipt_handle)
            .await
        {
            error!(
                error = %source,
                "Redrive published to all sources but the original could not be deleted"
            );
            report.failed_step = Some(RedriveStep::Delete);
            return Err(ConsoleError::RedriveIncomplete {
                report: Box::new(report),
                source,
            });
        }
        report.original_deleted = true;

        info!(targets = report.published_to.len(), "Message redriven");
        Ok(report)
    }

    /// Redrive every message on the queue
    ///
    /// The queue service has no atomic bulk redrive, so after checking that
    /// redrive sources exist this reports the operation as unimplemented.
    #[instrument(skip(self))]
    pub async fn retry_all_messages(&self, queue_name: &str) -> ConsoleResult<()> {
        let queue = self.directory.lookup_by_name(queue_name).await?;
        self.required_sources(&queue).await?;

        Err(ConsoleError::Unimplemented {
            operation: "retry_all_messages".to_string(),
        })
    }
}
