//! Performance report aggregation and delivery

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ocloud_monitor::PerformanceJob;
use ocloud_monitor::actors::reporter::ReporterHandle;
use ocloud_monitor::notify::NotificationSender;
use ocloud_monitor::storage::{JobStore, MemoryStore, MetricStore};
use ocloud_monitor::MetricSample;

use crate::helpers::body_json;

fn job(callback_uri: &str, reporting_period_secs: u64) -> PerformanceJob {
    PerformanceJob {
        job_id: "job-1".to_string(),
        object_type: "Resource".to_string(),
        object_instance_ids: vec!["res-1".to_string()],
        metric_names: vec!["cpu_usage".to_string(), "memory_usage".to_string()],
        callback_uri: callback_uri.to_string(),
        collection_period_secs: 300,
        reporting_period_secs,
        created_at: Utc::now(),
        last_report_time: None,
    }
}

async fn record(store: &MemoryStore, metric: &str, value: f64, age_secs: i64) {
    store
        .record_sample(MetricSample {
            resource_id: "res-1".to_string(),
            metric_name: metric.to_string(),
            value,
            timestamp: Utc::now() - ChronoDuration::seconds(age_secs),
        })
        .await
        .unwrap();
}

fn spawn_reporter(store: Arc<MemoryStore>, check_interval_secs: u64) -> ReporterHandle {
    let (reporter, _) = ReporterHandle::spawn(
        store.clone(),
        store,
        NotificationSender::new(2, 1),
        check_interval_secs,
    );
    reporter
}

#[tokio::test]
async fn report_carries_window_aggregates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.add_job(job(&format!("{}/report", server.uri()), 300)).await;

    record(&store, "cpu_usage", 10.0, 30).await;
    record(&store, "cpu_usage", 30.0, 20).await;
    record(&store, "cpu_usage", 20.0, 10).await;
    // Outside the 300s collection window: must not count.
    record(&store, "cpu_usage", 99.0, 400).await;

    let reporter = spawn_reporter(store.clone(), 3600);
    reporter.report_now("job-1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body = body_json(&requests[0]);
    assert_eq!(body["reportType"], "performanceReport");
    assert_eq!(body["jobId"], "job-1");
    assert_eq!(body["reportingPeriod"], 300);
    assert_eq!(body["collectionPeriod"], 300);

    let object = &body["data"][0];
    assert_eq!(object["objectInstanceId"], "res-1");
    assert_eq!(object["objectType"], "Resource");

    let cpu = &object["performanceMetrics"]["cpu_usage"];
    assert_eq!(cpu["current"], 20.0);
    assert_eq!(cpu["average"], 20.0);
    assert_eq!(cpu["min"], 10.0);
    assert_eq!(cpu["max"], 30.0);
    assert_eq!(cpu["samples"], 3);

    // No memory samples at all: the metric is absent, not zero.
    assert!(
        object["performanceMetrics"]
            .as_object()
            .unwrap()
            .get("memory_usage")
            .is_none()
    );

    // Successful delivery advanced the report clock.
    let stored = store.get_job("job-1").await.unwrap().unwrap();
    assert!(stored.last_report_time.is_some());

    reporter.shutdown().await;
}

#[tokio::test]
async fn failed_delivery_does_not_advance_report_clock() {
    let server = MockServer::start().await;
    // First attempt fails, the retry on a later cycle succeeds.
    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.add_job(job(&format!("{}/report", server.uri()), 300)).await;
    record(&store, "cpu_usage", 50.0, 10).await;

    let reporter = spawn_reporter(store.clone(), 3600);

    let result = reporter.report_now("job-1").await;
    assert!(result.is_err());
    assert!(
        store
            .get_job("job-1")
            .await
            .unwrap()
            .unwrap()
            .last_report_time
            .is_none()
    );

    reporter.report_now("job-1").await.unwrap();
    assert!(
        store
            .get_job("job-1")
            .await
            .unwrap()
            .unwrap()
            .last_report_time
            .is_some()
    );

    reporter.shutdown().await;
}

#[tokio::test]
async fn check_loop_respects_reporting_period() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());

    // Due immediately: created one period ago.
    let mut due = job(&format!("{}/report", server.uri()), 1);
    due.created_at = Utc::now() - ChronoDuration::seconds(5);
    store.add_job(due).await;

    // Not due for a long time.
    let mut not_due = job(&format!("{}/report", server.uri()), 3600);
    not_due.job_id = "job-2".to_string();
    store.add_job(not_due).await;

    record(&store, "cpu_usage", 50.0, 10).await;

    let reporter = spawn_reporter(store.clone(), 1);

    // Give the check loop a couple of ticks.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in &requests {
        assert_eq!(body_json(request)["jobId"], "job-1");
    }

    assert!(
        store
            .get_job("job-1")
            .await
            .unwrap()
            .unwrap()
            .last_report_time
            .is_some()
    );
    assert!(
        store
            .get_job("job-2")
            .await
            .unwrap()
            .unwrap()
            .last_report_time
            .is_none()
    );

    reporter.shutdown().await;
}

#[tokio::test]
async fn object_with_no_data_still_appears_in_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut empty_job = job(&format!("{}/report", server.uri()), 300);
    empty_job.object_instance_ids = vec!["res-silent".to_string()];
    store.add_job(empty_job).await;

    let reporter = spawn_reporter(store.clone(), 3600);
    reporter.report_now("job-1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = body_json(&requests[0]);

    let object = &body["data"][0];
    assert_eq!(object["objectInstanceId"], "res-silent");
    assert_eq!(object["performanceMetrics"], json!({}));

    reporter.shutdown().await;
}

#[tokio::test]
async fn report_now_on_unknown_job_errors() {
    let store = Arc::new(MemoryStore::new());
    let reporter = spawn_reporter(store, 3600);

    let result = reporter.report_now("no-such-job").await;
    assert!(result.is_err());

    reporter.shutdown().await;
}
