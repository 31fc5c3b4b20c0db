//! ThresholdEvaluator - drives the alarm lifecycle from metric samples
//!
//! Each cycle enumerates the monitored resources, reads the most recent
//! sample of every monitored metric, classifies it against the configured
//! thresholds, and creates, updates, or clears alarms accordingly. The
//! evaluator is the sole writer to the open-alarm registry, and a single
//! actor task serializes cycles, so two cycles never run concurrently.
//!
//! ## Alarm Lifecycle
//!
//! ```text
//! value ≥ critical/major/minor ──▶ open alarm (raise or update severity)
//! clear ≤ value < minor        ──▶ hold (hysteresis, no action)
//! value < clear                ──▶ clear open alarm, if any
//! ```
//!
//! Exactly one notification is enqueued per state transition; re-classifying
//! at an unchanged severity enqueues nothing.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::config::{MonitorConfig, alarm_type_for, probable_cause_for};
use crate::monitors::thresholds::{ThresholdDecision, classify, matched_threshold};
use crate::registry::{AlarmKey, AlarmRegistry};
use crate::storage::{AlarmStore, MetricStore, ResourceInventory, StorageResult};
use crate::{Alarm, AlarmPatch, Resource, Severity};

use super::dispatcher::DispatcherHandle;
use super::messages::{EvaluatorCommand, EvaluatorState};

/// System-level metrics read for every resource.
const SYSTEM_METRICS: [&str; 2] = ["cpu_usage", "memory_usage"];

/// Condition tag for a process-backed resource whose process is gone.
const COND_PROCESS_NOT_FOUND: &str = "process_not_found";

/// Condition tag for a resource whose operational state is disabled.
const COND_STATE_CHANGE: &str = "resource_state_change";

/// Actor that evaluates metrics and manages alarms.
pub struct ThresholdEvaluator {
    config: MonitorConfig,

    inventory: Arc<dyn ResourceInventory>,
    metrics: Arc<dyn MetricStore>,
    alarms: Arc<dyn AlarmStore>,

    /// Open-alarm index. Owned here; nothing else mutates it.
    registry: AlarmRegistry,

    dispatcher: DispatcherHandle,

    command_rx: mpsc::Receiver<EvaluatorCommand>,

    last_cycle: Option<DateTime<Utc>>,
}

impl ThresholdEvaluator {
    pub fn new(
        config: MonitorConfig,
        inventory: Arc<dyn ResourceInventory>,
        metrics: Arc<dyn MetricStore>,
        alarms: Arc<dyn AlarmStore>,
        registry: AlarmRegistry,
        dispatcher: DispatcherHandle,
        command_rx: mpsc::Receiver<EvaluatorCommand>,
    ) -> Self {
        Self {
            config,
            inventory,
            metrics,
            alarms,
            registry,
            dispatcher,
            command_rx,
            last_cycle: None,
        }
    }

    /// Run the actor's main loop.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting threshold evaluator (interval {}s)",
            self.config.check_interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.check_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A cycle must never kill the loop; log and wait for
                    // the next tick.
                    if let Err(e) = self.run_cycle().await {
                        error!("evaluation cycle failed: {e:#}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        EvaluatorCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            let result = self.run_cycle().await;
                            let _ = respond_to.send(result);
                        }

                        EvaluatorCommand::GetState { respond_to } => {
                            let _ = respond_to.send(EvaluatorState {
                                open_alarms: self.registry.len(),
                                last_cycle: self.last_cycle,
                            });
                        }

                        EvaluatorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("threshold evaluator stopped");
    }

    /// One evaluation cycle over all monitored resources.
    ///
    /// A failure on one resource is logged and does not abort the cycle
    /// for the others.
    async fn run_cycle(&mut self) -> anyhow::Result<()> {
        let resources = self
            .inventory
            .list_resources()
            .await
            .context("failed to enumerate resources")?;

        trace!("evaluating {} resources", resources.len());

        for resource in resources {
            if let Err(e) = self.check_resource(&resource).await {
                warn!(
                    "skipping resource {} this cycle: {e}",
                    resource.resource_id
                );
            }
        }

        self.last_cycle = Some(Utc::now());
        Ok(())
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.resource_id))]
    async fn check_resource(&mut self, resource: &Resource) -> StorageResult<()> {
        for metric_name in SYSTEM_METRICS {
            self.check_metric(&resource.resource_id, metric_name).await?;
        }

        if self
            .config
            .process_resource_types
            .contains(&resource.resource_type_id)
        {
            self.check_process_conditions(resource).await?;
            self.check_operational_state(resource).await?;
        }

        Ok(())
    }

    /// Classify the most recent sample of one metric, if there is one
    /// inside the look-back window.
    async fn check_metric(&mut self, resource_id: &str, metric_name: &str) -> StorageResult<()> {
        let since = Utc::now() - ChronoDuration::seconds(self.config.lookback_secs as i64);
        let samples = self.metrics.query_since(resource_id, metric_name, since).await?;

        let Some(latest) = samples.last() else {
            trace!("no recent {metric_name} samples for {resource_id}");
            return Ok(());
        };

        self.apply_threshold(resource_id, metric_name, latest.value)
            .await
    }

    async fn apply_threshold(
        &mut self,
        resource_id: &str,
        condition: &str,
        value: f64,
    ) -> StorageResult<()> {
        let Some(thresholds) = self.config.thresholds.get(condition).copied() else {
            return Ok(());
        };

        match classify(value, &thresholds) {
            ThresholdDecision::Raise(severity) => {
                let cause = probable_cause_for(
                    condition,
                    value,
                    matched_threshold(severity, &thresholds),
                );
                self.create_or_update_alarm(resource_id, condition, true, severity, cause)
                    .await?;
            }
            ThresholdDecision::Clear => {
                self.clear_alarm_if_exists(resource_id, condition).await?;
            }
            ThresholdDecision::Hold => {
                trace!("{resource_id}/{condition} at {value:.1} in hysteresis band, holding");
            }
        }

        Ok(())
    }

    /// Process liveness and per-process usage checks for process-backed
    /// resources, read from the inventory extensions bag.
    async fn check_process_conditions(&mut self, resource: &Resource) -> StorageResult<()> {
        let extensions = parsed_extensions(resource);
        let process = &extensions["process"];

        let pid = process["pid"].as_u64().unwrap_or(0);
        if pid == 0 {
            self.create_or_update_alarm(
                &resource.resource_id,
                COND_PROCESS_NOT_FOUND,
                false,
                Severity::Critical,
                "Managed process not running or not discovered".to_string(),
            )
            .await?;
            return Ok(());
        }

        self.clear_alarm_if_exists(&resource.resource_id, COND_PROCESS_NOT_FOUND)
            .await?;

        let usage = &extensions["resources"];
        if let Some(cpu_percent) = usage["cpu_percent"].as_f64() {
            self.apply_threshold(&resource.resource_id, "process_cpu", cpu_percent)
                .await?;
        }
        if let Some(memory_percent) = usage["memory_percent"].as_f64() {
            self.apply_threshold(&resource.resource_id, "process_memory", memory_percent)
                .await?;
        }

        Ok(())
    }

    async fn check_operational_state(&mut self, resource: &Resource) -> StorageResult<()> {
        if resource.operational_state == "disabled" {
            self.create_or_update_alarm(
                &resource.resource_id,
                COND_STATE_CHANGE,
                false,
                Severity::Major,
                "Resource operational state is disabled".to_string(),
            )
            .await?;
        } else {
            self.clear_alarm_if_exists(&resource.resource_id, COND_STATE_CHANGE)
                .await?;
        }

        Ok(())
    }

    /// Raise a new alarm for the key, or update the open one.
    ///
    /// Re-classification at an unchanged severity is a no-op; a severity
    /// change updates the stored alarm and enqueues `alarm.changed`; a new
    /// alarm enqueues `alarm.raised`. Exactly one enqueue per transition.
    async fn create_or_update_alarm(
        &mut self,
        resource_id: &str,
        condition: &str,
        metric_bound: bool,
        severity: Severity,
        probable_cause: String,
    ) -> StorageResult<String> {
        let key = AlarmKey::new(resource_id, condition);

        if let Some(existing_id) = self.registry.get(&key).map(str::to_string) {
            match self.alarms.get(&existing_id).await? {
                Some(existing) if !existing.is_cleared() => {
                    if existing.perceived_severity != severity {
                        self.alarms
                            .update_fields(
                                &existing_id,
                                AlarmPatch {
                                    perceived_severity: Some(severity),
                                    ..Default::default()
                                },
                            )
                            .await?;

                        debug!(
                            "alarm {existing_id} severity {} -> {severity}",
                            existing.perceived_severity
                        );

                        if self.config.send_notifications {
                            self.dispatcher.notify_alarm_changed(&existing_id);
                        }
                    }

                    return Ok(existing_id);
                }
                // Index entry went stale (alarm cleared or gone behind our
                // back); drop it and fall through to create a fresh one.
                _ => {
                    self.registry.remove(&key);
                }
            }
        }

        let alarm_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let alarm = Alarm {
            alarm_id: alarm_id.clone(),
            resource_id: resource_id.to_string(),
            metric_name: metric_bound.then(|| condition.to_string()),
            perceived_severity: severity,
            probable_cause: probable_cause.clone(),
            alarm_type: alarm_type_for(condition),
            is_root_cause: false,
            raised_time: now,
            changed_time: now,
            cleared_time: None,
            acknowledged: false,
        };

        self.alarms.create(alarm).await?;
        self.registry.insert(key, alarm_id.clone());

        if self.config.send_notifications {
            self.dispatcher.notify_alarm_raised(&alarm_id);
        }

        info!("raised {severity} alarm for {resource_id}/{condition}: {probable_cause}");
        Ok(alarm_id)
    }

    /// Clear the open alarm for the key, if any. Idempotent: clearing an
    /// absent or already-cleared key does nothing and enqueues nothing.
    async fn clear_alarm_if_exists(
        &mut self,
        resource_id: &str,
        condition: &str,
    ) -> StorageResult<()> {
        let key = AlarmKey::new(resource_id, condition);

        let Some(alarm_id) = self.registry.get(&key).map(str::to_string) else {
            return Ok(());
        };

        if let Some(alarm) = self.alarms.get(&alarm_id).await?
            && !alarm.is_cleared()
        {
            self.alarms.mark_cleared(&alarm_id).await?;

            if self.config.send_notifications {
                self.dispatcher.notify_alarm_cleared(&alarm_id);
            }

            info!("cleared alarm {alarm_id} for {resource_id}/{condition}");
        }

        self.registry.remove(&key);
        Ok(())
    }
}

/// Tolerant view of the extensions bag: some producers store it as a
/// JSON-encoded string instead of an object.
fn parsed_extensions(resource: &Resource) -> Value {
    match &resource.extensions {
        Value::String(encoded) => serde_json::from_str(encoded).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Handle for controlling the ThresholdEvaluator.
#[derive(Clone)]
pub struct EvaluatorHandle {
    sender: mpsc::Sender<EvaluatorCommand>,
}

impl EvaluatorHandle {
    /// Spawn the evaluator actor.
    ///
    /// Rebuilds the open-alarm registry from the alarm store first so the
    /// one-open-alarm-per-key invariant survives a restart; if the rebuild
    /// fails the evaluator starts with an empty registry and logs the gap.
    pub async fn spawn(
        config: MonitorConfig,
        inventory: Arc<dyn ResourceInventory>,
        metrics: Arc<dyn MetricStore>,
        alarms: Arc<dyn AlarmStore>,
        dispatcher: DispatcherHandle,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let registry = match AlarmRegistry::rebuild(alarms.as_ref()).await {
            Ok(registry) => registry,
            Err(e) => {
                warn!("could not rebuild alarm registry, starting empty: {e}");
                AlarmRegistry::new()
            }
        };

        let (command_tx, command_rx) = mpsc::channel(8);

        let actor = ThresholdEvaluator::new(
            config,
            inventory,
            metrics,
            alarms,
            registry,
            dispatcher,
            command_rx,
        );

        let join = tokio::spawn(actor.run());

        (Self { sender: command_tx }, join)
    }

    /// Run an evaluation cycle immediately.
    pub async fn run_now(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EvaluatorCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Snapshot of the evaluator's bookkeeping.
    pub async fn state(&self) -> Option<EvaluatorState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EvaluatorCommand::GetState { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Request a graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(EvaluatorCommand::Shutdown).await;
    }
}
