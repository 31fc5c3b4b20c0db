//! Notification payload envelopes
//!
//! These are the crate's only wire contract. Field names must stay exactly
//! as they are: subscribers parse `notificationEventType`, `objectRef`,
//! `objectType`, `notificationId`, `subscriptionId`, `timestamp`, plus the
//! event-specific fields.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::{Alarm, PerformanceJob};

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Envelope for resource inventory change notifications.
pub fn resource_notification(
    event_type: &str,
    resource_id: &str,
    data: &Value,
    notification_id: &str,
    subscription_id: &str,
) -> Value {
    json!({
        "notificationEventType": event_type,
        "objectRef": format!("/O2ims_infrastructureInventory/v1/resources/{resource_id}"),
        "objectType": "ResourceInfo",
        "notificationId": notification_id,
        "subscriptionId": subscription_id,
        "timestamp": timestamp_now(),
        "data": data,
    })
}

/// Envelope for alarm lifecycle notifications.
pub fn alarm_notification(
    event_type: &str,
    alarm: &Alarm,
    notification_id: &str,
    subscription_id: &str,
) -> Value {
    json!({
        "notificationEventType": event_type,
        "objectRef": format!("/O2dms_infrastructureMonitoring/v1/alarms/{}", alarm.alarm_id),
        "objectType": "AlarmEventRecord",
        "notificationId": notification_id,
        "subscriptionId": subscription_id,
        "timestamp": timestamp_now(),
        "alarmId": alarm.alarm_id,
        "resourceId": alarm.resource_id,
        "perceivedSeverity": alarm.perceived_severity,
        "probableCause": alarm.probable_cause,
        "alarmRaisedTime": alarm.raised_time.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Envelope for a periodic performance report.
///
/// `data` holds one entry per monitored object instance with its
/// per-metric aggregates.
pub fn performance_report(job: &PerformanceJob, data: Vec<Value>) -> Value {
    json!({
        "reportType": "performanceReport",
        "jobId": job.job_id,
        "timestamp": timestamp_now(),
        "reportingPeriod": job.reporting_period_secs,
        "collectionPeriod": job.collection_period_secs,
        "data": data,
    })
}
