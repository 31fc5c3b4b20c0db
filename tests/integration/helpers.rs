//! Helper functions for integration tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use wiremock::MockServer;

use ocloud_monitor::{
    MetricSample, Resource, Subscription, SubscriptionType,
    actors::{dispatcher::DispatcherHandle, evaluator::EvaluatorHandle},
    config::MonitorConfig,
    notify::NotificationSender,
    storage::{MemoryStore, MetricStore},
};

/// Config with the periodic timers effectively disabled so tests drive
/// cycles explicitly via RunNow.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        check_interval_secs: 3600,
        report_check_interval_secs: 3600,
        delivery_timeout_secs: 2,
        max_retries: 1,
        ..Default::default()
    }
}

pub fn compute_resource(resource_id: &str, pool_id: &str) -> Resource {
    Resource {
        resource_id: resource_id.to_string(),
        resource_type_id: "type-compute-node".to_string(),
        resource_pool_id: pool_id.to_string(),
        operational_state: "enabled".to_string(),
        extensions: json!({}),
    }
}

pub fn subscription(subscription_id: &str, callback_uri: &str, filter: Option<Value>) -> Subscription {
    Subscription {
        subscription_id: subscription_id.to_string(),
        subscription_type: SubscriptionType::Dms,
        callback_uri: callback_uri.to_string(),
        filter,
        created_time: Utc::now(),
    }
}

pub async fn record_cpu(store: &MemoryStore, resource_id: &str, value: f64) {
    store
        .record_sample(MetricSample {
            resource_id: resource_id.to_string(),
            metric_name: "cpu_usage".to_string(),
            value,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
}

/// Spawn a dispatcher and an evaluator over a shared memory store.
pub async fn spawn_stack(
    store: Arc<MemoryStore>,
    config: MonitorConfig,
) -> (DispatcherHandle, EvaluatorHandle) {
    let sender = NotificationSender::new(config.delivery_timeout_secs, config.max_retries);

    let (dispatcher, _) =
        DispatcherHandle::spawn(store.clone(), store.clone(), store.clone(), sender);

    let (evaluator, _) = EvaluatorHandle::spawn(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        dispatcher.clone(),
    )
    .await;

    (dispatcher, evaluator)
}

/// Wait until the mock server has received `expected` requests, or panic
/// after a couple of seconds. Delivery happens on the dispatcher's own
/// task, so tests cannot just assert immediately after RunNow returns.
pub async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<wiremock::Request> {
    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= expected {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let requests = server.received_requests().await.unwrap_or_default();
    panic!(
        "expected {expected} requests, mock server saw {}",
        requests.len()
    );
}

/// Give in-flight deliveries a moment, then return everything received.
pub async fn settled_requests(server: &MockServer) -> Vec<wiremock::Request> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.received_requests().await.unwrap_or_default()
}

pub fn body_json(request: &wiremock::Request) -> Value {
    serde_json::from_slice(&request.body).expect("request body should be JSON")
}
