//! End-to-end alarm lifecycle: threshold crossing to delivered callback

use std::sync::Arc;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ocloud_monitor::Severity;
use ocloud_monitor::storage::{AlarmQuery, AlarmStore, MemoryStore};

use crate::helpers::*;

async fn callback_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn critical_cpu_raises_one_alarm_and_delivers_once() {
    let server = callback_server().await;
    let store = Arc::new(MemoryStore::new());

    store.upsert_resource(compute_resource("res-1", "pool-1")).await;
    store
        .add_subscription(subscription(
            "sub-1",
            &format!("{}/events", server.uri()),
            None,
        ))
        .await;
    record_cpu(&store, "res-1", 96.0).await;

    let (_dispatcher, evaluator) = spawn_stack(store.clone(), test_config()).await;
    evaluator.run_now().await.unwrap();

    let requests = wait_for_requests(&server, 1).await;
    let body = body_json(&requests[0]);

    assert_eq!(body["notificationEventType"], "alarm.raised");
    assert_eq!(body["perceivedSeverity"], "CRITICAL");
    assert_eq!(body["resourceId"], "res-1");
    assert_eq!(body["objectType"], "AlarmEventRecord");
    assert_eq!(body["subscriptionId"], "sub-1");

    let open = store
        .list(AlarmQuery {
            active_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].perceived_severity, Severity::Critical);

    // Re-classifying at the same severity must not re-notify.
    evaluator.run_now().await.unwrap();
    let requests = settled_requests(&server).await;
    assert_eq!(requests.len(), 1);

    evaluator.shutdown().await;
}

#[tokio::test]
async fn recovery_below_clear_delivers_alarm_cleared() {
    let server = callback_server().await;
    let store = Arc::new(MemoryStore::new());

    store.upsert_resource(compute_resource("res-1", "pool-1")).await;
    store
        .add_subscription(subscription(
            "sub-1",
            &format!("{}/events", server.uri()),
            None,
        ))
        .await;
    record_cpu(&store, "res-1", 96.0).await;

    let (_dispatcher, evaluator) = spawn_stack(store.clone(), test_config()).await;
    evaluator.run_now().await.unwrap();
    wait_for_requests(&server, 1).await;

    // 72 is below the clear boundary of 75.
    record_cpu(&store, "res-1", 72.0).await;
    evaluator.run_now().await.unwrap();

    let requests = wait_for_requests(&server, 2).await;
    let body = body_json(&requests[1]);
    assert_eq!(body["notificationEventType"], "alarm.cleared");

    let open = store
        .list(AlarmQuery {
            active_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(open.is_empty());
    assert_eq!(evaluator.state().await.unwrap().open_alarms, 0);

    // Clearing again is a no-op: no third notification.
    evaluator.run_now().await.unwrap();
    let requests = settled_requests(&server).await;
    assert_eq!(requests.len(), 2);

    evaluator.shutdown().await;
}

#[tokio::test]
async fn severity_escalation_delivers_alarm_changed() {
    let server = callback_server().await;
    let store = Arc::new(MemoryStore::new());

    store.upsert_resource(compute_resource("res-1", "pool-1")).await;
    store
        .add_subscription(subscription(
            "sub-1",
            &format!("{}/events", server.uri()),
            None,
        ))
        .await;
    record_cpu(&store, "res-1", 91.0).await;

    let (_dispatcher, evaluator) = spawn_stack(store.clone(), test_config()).await;
    evaluator.run_now().await.unwrap();
    let requests = wait_for_requests(&server, 1).await;
    let raised = body_json(&requests[0]);
    assert_eq!(raised["notificationEventType"], "alarm.raised");
    assert_eq!(raised["perceivedSeverity"], "MAJOR");

    record_cpu(&store, "res-1", 97.0).await;
    evaluator.run_now().await.unwrap();

    let requests = wait_for_requests(&server, 2).await;
    let changed = body_json(&requests[1]);
    assert_eq!(changed["notificationEventType"], "alarm.changed");
    assert_eq!(changed["perceivedSeverity"], "CRITICAL");
    assert_eq!(changed["alarmId"], raised["alarmId"]);

    evaluator.shutdown().await;
}

#[tokio::test]
async fn healthy_resource_produces_nothing() {
    let server = callback_server().await;
    let store = Arc::new(MemoryStore::new());

    store.upsert_resource(compute_resource("res-1", "pool-1")).await;
    store
        .add_subscription(subscription(
            "sub-1",
            &format!("{}/events", server.uri()),
            None,
        ))
        .await;
    record_cpu(&store, "res-1", 42.0).await;

    let (_dispatcher, evaluator) = spawn_stack(store.clone(), test_config()).await;
    evaluator.run_now().await.unwrap();

    let requests = settled_requests(&server).await;
    assert!(requests.is_empty());

    let alarms = store.list(AlarmQuery::default()).await.unwrap();
    assert!(alarms.is_empty());

    evaluator.shutdown().await;
}
