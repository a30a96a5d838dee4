//! Scripted gateway shared by the unit tests of this crate.

use async_trait::async_trait;
use dlq_runtime::{
    AttributeMap, GatewayError, OutboundMessage, ProviderType, QueueGateway, QueueLocator,
    QueuePage, ReceiptHandle, ReceiveOptions, ReceivedMessage,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Gateway call as recorded by [`ScriptedGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListQueues { next_token: Option<String> },
    Count(String),
    Receive(String),
    Delete { queue: String, receipt: String },
    Purge(String),
    ListSources { queue: String, next_token: Option<String> },
    Send { queue: String, body: String },
}

/// Gateway whose responses are scripted per test
///
/// Unscripted calls succeed: list returns every registered queue in one page,
/// counts are 0, receives are empty.
#[derive(Default)]
pub struct ScriptedGateway {
    pub calls: Arc<Mutex<Vec<GatewayCall>>>,
    queues: Mutex<Vec<QueueLocator>>,
    list_responses: Mutex<VecDeque<Result<QueuePage, GatewayError>>>,
    counts: Mutex<HashMap<QueueLocator, Result<u64, GatewayError>>>,
    receive_batches: Mutex<VecDeque<Result<Vec<ReceivedMessage>, GatewayError>>>,
    sources: Mutex<HashMap<QueueLocator, Vec<QueueLocator>>>,
    sources_page_size: Mutex<Option<usize>>,
    send_failures: Mutex<HashMap<QueueLocator, GatewayError>>,
    delete_failure: Mutex<Option<GatewayError>>,
    sent: Mutex<Vec<(QueueLocator, OutboundMessage)>>,
}

pub fn locator(name: &str) -> QueueLocator {
    QueueLocator::new(format!("https://sqs.test/000000000000/{}", name))
}

pub fn received(id: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: id.to_string(),
        body: format!("body-{}", id),
        receipt_handle: ReceiptHandle::new(format!("receipt-{}", id)),
        attributes: AttributeMap::new().with("tenant", "acme").with("blank", ""),
        system_attributes: AttributeMap::new().with("MessageGroupId", "g1"),
    }
}

pub fn received_range(from: usize, to: usize) -> Vec<ReceivedMessage> {
    (from..=to).map(|i| received(&format!("m{}", i))).collect()
}

pub fn connection_error() -> GatewayError {
    GatewayError::ConnectionFailed {
        message: "connection reset".to_string(),
    }
}

impl ScriptedGateway {
    pub fn with_queues(names: &[&str]) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.queues.lock().unwrap() = names.iter().map(|n| locator(n)).collect();
        Arc::new(gateway)
    }

    pub fn push_list_response(&self, response: Result<QueuePage, GatewayError>) {
        self.list_responses.lock().unwrap().push_back(response);
    }

    pub fn set_count(&self, name: &str, count: Result<u64, GatewayError>) {
        self.counts.lock().unwrap().insert(locator(name), count);
    }

    pub fn push_receive(&self, batch: Result<Vec<ReceivedMessage>, GatewayError>) {
        self.receive_batches.lock().unwrap().push_back(batch);
    }

    pub fn set_sources(&self, dlq: &str, sources: &[&str]) {
        self.sources
            .lock()
            .unwrap()
            .insert(locator(dlq), sources.iter().map(|n| locator(n)).collect());
    }

    pub fn set_sources_page_size(&self, size: usize) {
        *self.sources_page_size.lock().unwrap() = Some(size);
    }

    pub fn fail_send_to(&self, name: &str, error: GatewayError) {
        self.send_failures.lock().unwrap().insert(locator(name), error);
    }

    pub fn fail_delete(&self, error: GatewayError) {
        *self.delete_failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(QueueLocator, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueGateway for ScriptedGateway {
    async fn list_queues(
        &self,
        _name_prefix: Option<&str>,
        _max_results: u32,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        self.record(GatewayCall::ListQueues {
            next_token: next_token.map(str::to_string),
        });
        if let Some(response) = self.list_responses.lock().unwrap().pop_front() {
            return response;
        }
        Ok(QueuePage {
            locators: self.queues.lock().unwrap().clone(),
            next_token: None,
        })
    }

    async fn get_approximate_message_count(
        &self,
        queue: &QueueLocator,
    ) -> Result<u64, GatewayError> {
        self.record(GatewayCall::Count(queue.queue_name().to_string()));
        self.counts
            .lock()
            .unwrap()
            .get(queue)
            .cloned()
            .unwrap_or(Ok(0))
    }

    async fn receive_messages(
        &self,
        queue: &QueueLocator,
        _options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, GatewayError> {
        self.record(GatewayCall::Receive(queue.queue_name().to_string()));
        self.receive_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn delete_message(
        &self,
        queue: &QueueLocator,
        receipt: &ReceiptHandle,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Delete {
            queue: queue.queue_name().to_string(),
            receipt: receipt.to_string(),
        });
        match self.delete_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn purge_queue(&self, queue: &QueueLocator) -> Result<(), GatewayError> {
        self.record(GatewayCall::Purge(queue.queue_name().to_string()));
        Ok(())
    }

    async fn list_redrive_sources(
        &self,
        queue: &QueueLocator,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        self.record(GatewayCall::ListSources {
            queue: queue.queue_name().to_string(),
            next_token: next_token.map(str::to_string),
        });
        let sources = self
            .sources
            .lock()
            .unwrap()
            .get(queue)
            .cloned()
            .unwrap_or_default();
        let page_size = self.sources_page_size.lock().unwrap().unwrap_or(usize::MAX);
        let start: usize = next_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = start.saturating_add(page_size).min(sources.len());

        Ok(QueuePage {
            locators: sources[start..end].to_vec(),
            next_token: (end < sources.len()).then(|| end.to_string()),
        })
    }

    async fn send_message(
        &self,
        queue: &QueueLocator,
        message: &OutboundMessage,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Send {
            queue: queue.queue_name().to_string(),
            body: message.body.clone(),
        });
        if let Some(error) = self.send_failures.lock().unwrap().get(queue) {
            return Err(error.clone());
        }
        self.sent
            .lock()
            .unwrap()
            .push((queue.clone(), message.clone()));
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
