//! Tests for message retrieval.

use super::*;
use crate::directory::DirectoryConfig;
use crate::test_support::{connection_error, received, received_range, GatewayCall, ScriptedGateway};
use crate::ErrorKind;
use dlq_runtime::ReceiptHandle;

async fn retriever_for(names: &[&str]) -> (Arc<ScriptedGateway>, MessageRetriever) {
    let gateway = ScriptedGateway::with_queues(names);
    let directory = Arc::new(QueueDirectory::new(gateway.clone(), DirectoryConfig::default()));
    directory.refresh().await.unwrap();
    (gateway, MessageRetriever::new(directory, RetrievalConfig::default()))
}

fn receive_calls(gateway: &ScriptedGateway) -> usize {
    gateway.count_calls(|c| matches!(c, GatewayCall::Receive(_)))
}

#[test]
fn test_default_config_matches_receive_defaults() {
    let config = RetrievalConfig::default();

    assert_eq!(config.batch_size, 10);
    assert_eq!(config.visibility_timeout, Duration::from_secs(3));
    assert_eq!(config.wait_time, Duration::from_secs(1));
    assert_eq!(config.message_attribute_names, vec!["All".to_string()]);
    assert_eq!(
        config.system_attribute_names,
        vec!["MessageDeduplicationId".to_string(), "MessageGroupId".to_string()]
    );
    assert_eq!(config.receive_options(), ReceiveOptions::default());
}

#[tokio::test]
async fn test_overlapping_batches_are_deduplicated() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(15));
    gateway.push_receive(Ok(received_range(1, 10)));
    gateway.push_receive(Ok(received_range(9, 15)));

    let page = retriever.fetch_messages("q").await.unwrap();

    assert_eq!(page.messages.len(), 15);
    assert_eq!(page.approximate_total, 15);
    let ids: Vec<&str> = page.messages.iter().map(|m| m.message_id.as_str()).collect();
    let expected: Vec<String> = (1..=15).map(|i| format!("m{}", i)).collect();
    assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(receive_calls(&gateway), 2);
}

#[tokio::test]
async fn test_total_is_reported_count_not_distinct_count() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(4));
    gateway.push_receive(Ok(vec![received("a"), received("b")]));
    gateway.push_receive(Ok(vec![received("a"), received("b")]));

    let page = retriever.fetch_messages("q").await.unwrap();

    assert_eq!(page.messages.len(), 2);
    assert_eq!(page.approximate_total, 4);
}

#[tokio::test]
async fn test_empty_batch_stops_receiving() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(50));
    gateway.push_receive(Ok(received_range(1, 3)));

    let page = retriever.fetch_messages("q").await.unwrap();

    assert_eq!(page.messages.len(), 3);
    assert_eq!(page.approximate_total, 50);
    assert_eq!(receive_calls(&gateway), 2);
}

#[tokio::test]
async fn test_zero_count_skips_receive() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(0));

    let page = retriever.fetch_messages("q").await.unwrap();

    assert!(page.messages.is_empty());
    assert_eq!(receive_calls(&gateway), 0);
}

#[tokio::test]
async fn test_unknown_queue_is_not_found() {
    let (gateway, retriever) = retriever_for(&["q"]).await;

    let error = retriever.fetch_messages("other").await.unwrap_err();

    assert!(matches!(error, ConsoleError::QueueNotFound { .. }));
    assert_eq!(gateway.count_calls(|c| matches!(c, GatewayCall::Count(_))), 0);
}

#[tokio::test]
async fn test_count_failure_is_count_unavailable() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Err(connection_error()));

    let error = retriever.fetch_messages("q").await.unwrap_err();

    assert!(matches!(error, ConsoleError::CountUnavailable { .. }));
    assert_eq!(error.kind(), ErrorKind::GatewayFailure);
}

#[tokio::test]
async fn test_receive_failure_discards_partial_results() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(20));
    gateway.push_receive(Ok(received_range(1, 10)));
    gateway.push_receive(Err(connection_error()));

    let error = retriever.fetch_messages("q").await.unwrap_err();

    assert!(matches!(
        error,
        ConsoleError::Gateway {
            operation: "ReceiveMessage",
            ..
        }
    ));
}

#[tokio::test]
async fn test_message_carries_receipt_and_attributes() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(1));
    gateway.push_receive(Ok(vec![received("m1")]));

    let page = retriever.fetch_messages("q").await.unwrap();
    let message = page.find("m1").unwrap();

    assert_eq!(message.receipt_handle.as_str(), "receipt-m1");
    assert_eq!(message.body, "body-m1");
    assert_eq!(message.attributes.get("tenant"), Some("acme"));
    assert_eq!(message.system_attributes.get("MessageGroupId"), Some("g1"));
    assert!(page.find("m2").is_none());
}

#[tokio::test]
async fn test_repeated_message_keeps_position_and_latest_receipt() {
    let (gateway, retriever) = retriever_for(&["q"]).await;
    gateway.set_count("q", Ok(3));
    gateway.push_receive(Ok(vec![received("a"), received("b")]));
    let mut again = received("a");
    again.receipt_handle = ReceiptHandle::new("receipt-a-2");
    gateway.push_receive(Ok(vec![again]));

    let page = retriever.fetch_messages("q").await.unwrap();

    let ids: Vec<&str> = page.messages.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(page.messages[0].receipt_handle.as_str(), "receipt-a-2");
    assert_eq!(page.messages[1].receipt_handle.as_str(), "receipt-b");
}
