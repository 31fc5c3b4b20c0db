//! Store trait definitions
//!
//! One trait per collaborator. All traits are object-safe and `Send + Sync`
//! so they can be shared across actor tasks behind `Arc<dyn ...>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::{
    Alarm, AlarmPatch, MetricSample, PerformanceJob, Resource, Severity, Subscription,
    SubscriptionType,
};

/// Filter parameters for listing alarms
#[derive(Debug, Clone, Default)]
pub struct AlarmQuery {
    /// Restrict to alarms on one resource
    pub resource_id: Option<String>,

    /// Restrict to one perceived severity
    pub severity: Option<Severity>,

    /// Only alarms that have not been cleared
    pub active_only: bool,
}

/// Durable store of time-stamped metric samples.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append one sample. Samples are immutable once recorded.
    async fn record_sample(&self, sample: MetricSample) -> StorageResult<()>;

    /// All samples for one resource+metric at or after `since`, ordered by
    /// ascending timestamp.
    async fn query_since(
        &self,
        resource_id: &str,
        metric_name: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<MetricSample>>;
}

/// Durable store of alarm records.
///
/// Alarms are append-only fault history: `mark_cleared` stamps the cleared
/// time, nothing ever deletes a record.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Persist a new alarm, returning its id.
    async fn create(&self, alarm: Alarm) -> StorageResult<String>;

    async fn get(&self, alarm_id: &str) -> StorageResult<Option<Alarm>>;

    /// Apply a typed partial update to an open alarm. Any change bumps
    /// `changed_time`.
    async fn update_fields(&self, alarm_id: &str, patch: AlarmPatch) -> StorageResult<()>;

    /// Stamp the cleared time. Irreversible; calling it on an already
    /// cleared alarm leaves the original cleared time in place.
    async fn mark_cleared(&self, alarm_id: &str) -> StorageResult<()>;

    async fn list(&self, query: AlarmQuery) -> StorageResult<Vec<Alarm>>;
}

/// Read-only view of registered subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list(
        &self,
        subscription_type: Option<SubscriptionType>,
    ) -> StorageResult<Vec<Subscription>>;

    async fn get(&self, subscription_id: &str) -> StorageResult<Option<Subscription>>;
}

/// Store of performance monitoring jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list_jobs(&self) -> StorageResult<Vec<PerformanceJob>>;

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<PerformanceJob>>;

    /// Record the time of a successful report delivery.
    async fn update_last_report_time(
        &self,
        job_id: &str,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<()>;
}

/// Read-only view of the resource inventory maintained by discovery.
#[async_trait]
pub trait ResourceInventory: Send + Sync {
    async fn list_resources(&self) -> StorageResult<Vec<Resource>>;

    async fn get_resource(&self, resource_id: &str) -> StorageResult<Option<Resource>>;
}
