pub mod actors;
pub mod config;
pub mod monitors;
pub mod notify;
pub mod registry;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single time-stamped metric observation for one resource.
///
/// Samples are produced by the discovery/collection layer and are
/// append-only: once recorded they are never modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub resource_id: String,
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Perceived severity of a fault alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse fault category attached to every alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmType {
    ProcessingError,
    MemoryError,
    StorageCapacityProblem,
    CommunicationsAlarm,
    EquipmentAlarm,
    Other,
}

/// A fault record with an open/cleared lifecycle.
///
/// Alarms are created in the open state, may change severity while open,
/// and transition to cleared exactly once. They are never deleted - cleared
/// alarms remain in the store as fault history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub alarm_id: String,
    pub resource_id: String,

    /// Metric the alarm was raised for. `None` for condition alarms
    /// (process liveness, operational state) that are not bound to a
    /// single metric.
    pub metric_name: Option<String>,

    pub perceived_severity: Severity,
    pub probable_cause: String,
    pub alarm_type: AlarmType,
    pub is_root_cause: bool,
    pub raised_time: DateTime<Utc>,
    pub changed_time: DateTime<Utc>,
    pub cleared_time: Option<DateTime<Utc>>,
    pub acknowledged: bool,
}

impl Alarm {
    pub fn is_cleared(&self) -> bool {
        self.cleared_time.is_some()
    }
}

/// Typed partial update for an open alarm.
///
/// Only the fields that may legally change while an alarm is open are
/// representable here; clearing goes through `AlarmStore::mark_cleared`.
#[derive(Debug, Clone, Default)]
pub struct AlarmPatch {
    pub perceived_severity: Option<Severity>,
    pub acknowledged: Option<bool>,
}

/// Kind of subscription a subscriber registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Ims,
    Dms,
    Alarm,
    Performance,
}

/// A registered callback URI plus an opaque filter predicate.
///
/// Subscriptions are created and deleted by the API layer; this crate only
/// reads them. The filter is kept as raw JSON - its shape is validated at
/// creation time externally, and the matcher tolerates anything else by
/// treating it as non-matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub subscription_type: SubscriptionType,
    pub callback_uri: String,
    pub filter: Option<serde_json::Value>,
    pub created_time: DateTime<Utc>,
}

/// A standing request to periodically aggregate and deliver metric
/// statistics for a set of monitored objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceJob {
    pub job_id: String,
    pub object_type: String,
    pub object_instance_ids: Vec<String>,
    pub metric_names: Vec<String>,
    pub callback_uri: String,

    /// Trailing window (seconds) of samples each report aggregates over.
    pub collection_period_secs: u64,

    /// Minimum seconds between two reports for this job.
    pub reporting_period_secs: u64,

    pub created_at: DateTime<Utc>,

    /// Time of the last *successful* delivery. Mutated only by the
    /// report aggregator, and only after a 2xx response.
    pub last_report_time: Option<DateTime<Utc>>,
}

/// Inventory view of a monitored resource.
///
/// `extensions` is an opaque bag maintained by the discovery layer; for
/// process-backed resources it carries `process` and `resources` objects
/// with the pid and per-process usage figures. Some producers store it as
/// a JSON-encoded string, which the evaluator tolerates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    pub resource_type_id: String,
    pub resource_pool_id: String,
    pub operational_state: String,
    #[serde(default)]
    pub extensions: serde_json::Value,
}
