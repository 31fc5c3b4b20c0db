//! In-memory index of currently open alarms
//!
//! The registry is the deduplication contract: at most one open alarm per
//! `(resource, condition)` key. It is owned exclusively by the threshold
//! evaluator - no ambient global - and is rebuilt from the alarm store's
//! open alarms at startup so the invariant survives a restart.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::AlarmType;
use crate::storage::{AlarmQuery, AlarmStore, StorageResult};

/// Dedup key: a resource plus the metric name or condition tag the alarm
/// was raised for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlarmKey {
    pub resource_id: String,
    pub condition: String,
}

impl AlarmKey {
    pub fn new(resource_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            condition: condition.into(),
        }
    }
}

/// Index of open alarms by dedup key.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    open: HashMap<AlarmKey, String>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from the store's currently open alarms.
    ///
    /// Metric alarms key on their metric name. Condition alarms carry no
    /// metric name, so the condition tag is recovered from the alarm type;
    /// open alarms whose condition cannot be determined are skipped with a
    /// warning and will be re-raised (deduplicated by the store's history,
    /// not by us) on the next evaluation cycle.
    pub async fn rebuild(store: &dyn AlarmStore) -> StorageResult<Self> {
        let mut registry = AlarmRegistry::new();

        let open_alarms = store
            .list(AlarmQuery {
                active_only: true,
                ..Default::default()
            })
            .await?;

        for alarm in open_alarms {
            let condition = match (&alarm.metric_name, alarm.alarm_type) {
                (Some(metric), _) => metric.clone(),
                (None, AlarmType::CommunicationsAlarm) => "process_not_found".to_string(),
                (None, AlarmType::EquipmentAlarm) => "resource_state_change".to_string(),
                (None, other) => {
                    warn!(
                        "open alarm {} has no metric name and unrecognized type {other:?}, \
                         not indexing",
                        alarm.alarm_id
                    );
                    continue;
                }
            };

            registry.insert(
                AlarmKey::new(alarm.resource_id.clone(), condition),
                alarm.alarm_id.clone(),
            );
        }

        debug!("rebuilt alarm registry with {} open alarms", registry.len());
        Ok(registry)
    }

    pub fn get(&self, key: &AlarmKey) -> Option<&str> {
        self.open.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: AlarmKey, alarm_id: String) {
        self.open.insert(key, alarm_id);
    }

    pub fn remove(&mut self, key: &AlarmKey) -> Option<String> {
        self.open.remove(key)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
