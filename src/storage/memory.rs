//! In-memory store implementation (no persistence)
//!
//! Backs every store trait with `RwLock`-guarded maps. Used by the
//! reference binary and throughout the tests; the production deployment
//! substitutes database-backed implementations owned by the API layer.
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **Unbounded**: samples accumulate for the lifetime of the process

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{
    AlarmQuery, AlarmStore, JobStore, MetricStore, ResourceInventory, SubscriptionStore,
};
use super::error::{StorageError, StorageResult};
use crate::{
    Alarm, AlarmPatch, MetricSample, PerformanceJob, Resource, Subscription, SubscriptionType,
};

/// In-memory store backing all collaborator traits.
#[derive(Default)]
pub struct MemoryStore {
    samples: RwLock<HashMap<(String, String), Vec<MetricSample>>>,
    alarms: RwLock<HashMap<String, Alarm>>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    jobs: RwLock<HashMap<String, PerformanceJob>>,
    resources: RwLock<HashMap<String, Resource>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource in the inventory.
    pub async fn upsert_resource(&self, resource: Resource) {
        self.resources
            .write()
            .await
            .insert(resource.resource_id.clone(), resource);
    }

    pub async fn remove_resource(&self, resource_id: &str) {
        self.resources.write().await.remove(resource_id);
    }

    pub async fn add_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.subscription_id.clone(), subscription);
    }

    pub async fn remove_subscription(&self, subscription_id: &str) {
        self.subscriptions.write().await.remove(subscription_id);
    }

    pub async fn add_job(&self, job: PerformanceJob) {
        self.jobs.write().await.insert(job.job_id.clone(), job);
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn record_sample(&self, sample: MetricSample) -> StorageResult<()> {
        let key = (sample.resource_id.clone(), sample.metric_name.clone());
        self.samples.write().await.entry(key).or_default().push(sample);
        Ok(())
    }

    async fn query_since(
        &self,
        resource_id: &str,
        metric_name: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<MetricSample>> {
        let samples = self.samples.read().await;

        let mut matching: Vec<MetricSample> = samples
            .get(&(resource_id.to_string(), metric_name.to_string()))
            .map(|points| {
                points
                    .iter()
                    .filter(|sample| sample.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by_key(|sample| sample.timestamp);
        Ok(matching)
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn create(&self, alarm: Alarm) -> StorageResult<String> {
        let alarm_id = alarm.alarm_id.clone();
        self.alarms.write().await.insert(alarm_id.clone(), alarm);
        Ok(alarm_id)
    }

    async fn get(&self, alarm_id: &str) -> StorageResult<Option<Alarm>> {
        Ok(self.alarms.read().await.get(alarm_id).cloned())
    }

    async fn update_fields(&self, alarm_id: &str, patch: AlarmPatch) -> StorageResult<()> {
        let mut alarms = self.alarms.write().await;
        let alarm = alarms
            .get_mut(alarm_id)
            .ok_or_else(|| StorageError::NotFound(format!("alarm {alarm_id}")))?;

        if let Some(severity) = patch.perceived_severity {
            alarm.perceived_severity = severity;
        }
        if let Some(acknowledged) = patch.acknowledged {
            alarm.acknowledged = acknowledged;
        }
        alarm.changed_time = Utc::now();

        Ok(())
    }

    async fn mark_cleared(&self, alarm_id: &str) -> StorageResult<()> {
        let mut alarms = self.alarms.write().await;
        let alarm = alarms
            .get_mut(alarm_id)
            .ok_or_else(|| StorageError::NotFound(format!("alarm {alarm_id}")))?;

        if alarm.cleared_time.is_none() {
            let now = Utc::now();
            alarm.cleared_time = Some(now);
            alarm.changed_time = now;
        } else {
            debug!("alarm {alarm_id} already cleared, leaving cleared time in place");
        }

        Ok(())
    }

    async fn list(&self, query: AlarmQuery) -> StorageResult<Vec<Alarm>> {
        let alarms = self.alarms.read().await;

        let mut matching: Vec<Alarm> = alarms
            .values()
            .filter(|alarm| {
                query
                    .resource_id
                    .as_ref()
                    .is_none_or(|id| &alarm.resource_id == id)
            })
            .filter(|alarm| {
                query
                    .severity
                    .is_none_or(|severity| alarm.perceived_severity == severity)
            })
            .filter(|alarm| !query.active_only || !alarm.is_cleared())
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.raised_time.cmp(&a.raised_time));
        Ok(matching)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list(
        &self,
        subscription_type: Option<SubscriptionType>,
    ) -> StorageResult<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;

        Ok(subscriptions
            .values()
            .filter(|sub| subscription_type.is_none_or(|t| sub.subscription_type == t))
            .cloned()
            .collect())
    }

    async fn get(&self, subscription_id: &str) -> StorageResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .get(subscription_id)
            .cloned())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn list_jobs(&self) -> StorageResult<Vec<PerformanceJob>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<PerformanceJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update_last_report_time(
        &self,
        job_id: &str,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StorageError::NotFound(format!("performance job {job_id}")))?;

        job.last_report_time = Some(timestamp);
        Ok(())
    }
}

#[async_trait]
impl ResourceInventory for MemoryStore {
    async fn list_resources(&self) -> StorageResult<Vec<Resource>> {
        Ok(self.resources.read().await.values().cloned().collect())
    }

    async fn get_resource(&self, resource_id: &str) -> StorageResult<Option<Resource>> {
        Ok(self.resources.read().await.get(resource_id).cloned())
    }
}
