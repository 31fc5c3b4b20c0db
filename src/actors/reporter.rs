//! ReportAggregator - periodic performance report delivery
//!
//! Polls the active performance jobs on a short interval (much shorter
//! than any job's reporting period), decides per job whether a report is
//! due, aggregates the job's metrics over its trailing collection window,
//! and POSTs the report to the job's own callback. Reports bypass
//! subscription filtering entirely.
//!
//! `last_report_time` advances only on a successful delivery, so a job
//! whose callback failed is retried on the next eligible cycle.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{Map, Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::notify::{NotificationSender, payload};
use crate::storage::{JobStore, MetricStore};
use crate::{MetricSample, PerformanceJob};

use super::messages::ReporterCommand;

/// Is a report due for this job?
///
/// Elapsed time since the last successful report (or since job creation
/// if none was ever delivered) must reach the job's reporting period.
pub fn should_generate_report(job: &PerformanceJob, now: DateTime<Utc>) -> bool {
    let reference = job.last_report_time.unwrap_or(job.created_at);
    (now - reference).num_seconds() >= job.reporting_period_secs as i64
}

/// Per-metric aggregates over one collection window.
fn aggregate(samples: &[MetricSample]) -> Option<Value> {
    let last = samples.last()?;

    let count = samples.len();
    let sum: f64 = samples.iter().map(|s| s.value).sum();
    let min = samples.iter().map(|s| s.value).fold(f64::INFINITY, f64::min);
    let max = samples
        .iter()
        .map(|s| s.value)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(json!({
        "current": last.value,
        "average": sum / count as f64,
        "min": min,
        "max": max,
        "samples": count,
    }))
}

/// Actor that checks jobs and delivers performance reports.
pub struct ReportAggregator {
    jobs: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricStore>,

    sender: NotificationSender,

    check_interval: Duration,

    command_rx: mpsc::Receiver<ReporterCommand>,
}

impl ReportAggregator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricStore>,
        sender: NotificationSender,
        check_interval_secs: u64,
        command_rx: mpsc::Receiver<ReporterCommand>,
    ) -> Self {
        Self {
            jobs,
            metrics,
            sender,
            check_interval: Duration::from_secs(check_interval_secs),
            command_rx,
        }
    }

    /// Run the actor's main loop.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting report aggregator");

        let mut ticker = interval(self.check_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.check_jobs().await {
                        error!("report check failed: {e:#}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ReporterCommand::ReportNow { job_id, respond_to } => {
                            debug!("received ReportNow for job {job_id}");
                            let result = self.report_single(&job_id).await;
                            let _ = respond_to.send(result);
                        }

                        ReporterCommand::Shutdown => {
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

        debug!("report aggregator stopped");
    }

    /// Check every job, generating reports for the ones that are due.
    ///
    /// A failure on one job is logged and does not abort the cycle for
    /// the others.
    async fn check_jobs(&self) -> anyhow::Result<()> {
        let jobs = self
            .jobs
            .list_jobs()
            .await
            .context("failed to list performance jobs")?;

        let now = Utc::now();

        for job in jobs {
            if !should_generate_report(&job, now) {
                continue;
            }

            if let Err(e) = self.generate_and_deliver(&job).await {
                warn!("report for job {} failed: {e:#}", job.job_id);
            }
        }

        Ok(())
    }

    async fn report_single(&self, job_id: &str) -> anyhow::Result<()> {
        let job = self
            .jobs
            .get_job(job_id)
            .await
            .context("failed to load job")?
            .with_context(|| format!("no performance job {job_id}"))?;

        self.generate_and_deliver(&job).await
    }

    /// Aggregate the job's metrics and deliver a report.
    ///
    /// A single delivery attempt: if it fails, the job stays eligible and
    /// the next check cycle tries again.
    #[instrument(skip(self, job), fields(job_id = %job.job_id))]
    async fn generate_and_deliver(&self, job: &PerformanceJob) -> anyhow::Result<()> {
        trace!("generating report for job {}", job.job_id);

        let now = Utc::now();
        let since = now - ChronoDuration::seconds(job.collection_period_secs as i64);

        let mut data = Vec::with_capacity(job.object_instance_ids.len());

        for object_id in &job.object_instance_ids {
            let mut metrics_map = Map::new();

            for metric_name in &job.metric_names {
                let samples = match self
                    .metrics
                    .query_since(object_id, metric_name, since)
                    .await
                {
                    Ok(samples) => samples,
                    Err(e) => {
                        warn!("could not read {metric_name} for {object_id}: {e}");
                        continue;
                    }
                };

                // No samples in the window means no entry at all: absence
                // signals "no data", not "value is zero".
                if let Some(aggregates) = aggregate(&samples) {
                    metrics_map.insert(metric_name.clone(), aggregates);
                }
            }

            data.push(json!({
                "objectType": job.object_type,
                "objectInstanceId": object_id,
                "performanceMetrics": metrics_map,
            }));
        }

        let report = payload::performance_report(job, data);

        self.sender
            .send_once(&job.callback_uri, &report)
            .await
            .with_context(|| format!("delivery to {} failed", job.callback_uri))?;

        // Delivery succeeded; only now does the report clock advance.
        self.jobs
            .update_last_report_time(&job.job_id, now)
            .await
            .context("failed to record report time")?;

        debug!("report for job {} delivered", job.job_id);
        Ok(())
    }
}

/// Handle for controlling the ReportAggregator.
#[derive(Clone)]
pub struct ReporterHandle {
    sender: mpsc::Sender<ReporterCommand>,
}

impl ReporterHandle {
    /// Spawn the aggregator actor.
    pub fn spawn(
        jobs: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricStore>,
        sender: NotificationSender,
        check_interval_secs: u64,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(8);

        let actor = ReportAggregator::new(jobs, metrics, sender, check_interval_secs, command_rx);

        let join = tokio::spawn(actor.run());

        (Self { sender: command_tx }, join)
    }

    /// Generate and deliver a report for one job immediately.
    pub async fn report_now(&self, job_id: impl Into<String>) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReporterCommand::ReportNow {
                job_id: job_id.into(),
                respond_to: tx,
            })
            .await
            .context("failed to send ReportNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Request a graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ReporterCommand::Shutdown).await;
    }
}
