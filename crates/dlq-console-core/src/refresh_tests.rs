//! Tests for the background refresh task.

use super::*;
use crate::directory::{DirectoryConfig, DirectoryState};
use crate::retry::RetryPolicy;
use crate::test_support::{connection_error, GatewayCall, ScriptedGateway};

fn list_calls(gateway: &ScriptedGateway) -> usize {
    gateway.count_calls(|c| matches!(c, GatewayCall::ListQueues { .. }))
}

#[tokio::test(start_paused = true)]
async fn test_task_refreshes_immediately_and_on_interval() {
    let gateway = ScriptedGateway::with_queues(&["orders"]);
    let directory = Arc::new(QueueDirectory::new(gateway.clone(), DirectoryConfig::default()));

    let handle = RefreshTask::spawn(Arc::clone(&directory), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(directory.snapshot().await.generation, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(directory.snapshot().await.generation, 2);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(directory.snapshot().await.generation, 4);
    assert_eq!(list_calls(&gateway), 4);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_further_refreshes() {
    let gateway = ScriptedGateway::with_queues(&["orders"]);
    let directory = Arc::new(QueueDirectory::new(gateway.clone(), DirectoryConfig::default()));

    let handle = RefreshTask::spawn(Arc::clone(&directory), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_millis(1)).await;
    handle.shutdown().await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(list_calls(&gateway), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_unbounded_retry() {
    let gateway = ScriptedGateway::with_queues(&[]);
    for _ in 0..1000 {
        gateway.push_list_response(Err(connection_error()));
    }
    let config = DirectoryConfig {
        retry_policy: RetryPolicy::default().with_jitter(0.0),
        ..DirectoryConfig::default()
    };
    let directory = Arc::new(QueueDirectory::new(gateway.clone(), config));

    let handle = RefreshTask::spawn(Arc::clone(&directory), Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!handle.is_finished());

    handle.shutdown().await;

    assert_eq!(directory.state().await, DirectoryState::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_cycle_keeps_task_running() {
    let gateway = ScriptedGateway::with_queues(&["orders"]);
    gateway.push_list_response(Err(connection_error()));
    gateway.push_list_response(Err(connection_error()));
    let config = DirectoryConfig {
        retry_policy: RetryPolicy::forever(Duration::from_millis(5), Duration::from_millis(5), 1.0)
            .with_max_retries(1)
            .with_jitter(0.0),
        ..DirectoryConfig::default()
    };
    let directory = Arc::new(QueueDirectory::new(gateway.clone(), config));

    let handle = RefreshTask::spawn(Arc::clone(&directory), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(directory.state().await, DirectoryState::Empty);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(directory.snapshot().await.generation, 1);

    handle.shutdown().await;
}
