//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: request/response messages sent to specific actors via mpsc
//! 2. **Events**: transient units of work pushed into the dispatcher queue
//! 3. **Immutability**: all messages are cloneable

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;

/// A state change awaiting delivery to subscribers.
///
/// Events live only in the dispatcher's in-memory queue: they are never
/// persisted and are lost on restart. Within a running process delivery
/// is best-effort at-least-once via retries.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    ResourceCreated { resource_id: String, data: Value },
    ResourceUpdated { resource_id: String, data: Value },
    ResourceDeleted { resource_id: String },
    AlarmRaised { alarm_id: String },
    AlarmChanged { alarm_id: String },
    AlarmCleared { alarm_id: String },
}

impl NotificationEvent {
    /// Wire name of the event, as it appears in `notificationEventType`.
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::ResourceCreated { .. } => "resourceInfo.created",
            NotificationEvent::ResourceUpdated { .. } => "resourceInfo.updated",
            NotificationEvent::ResourceDeleted { .. } => "resourceInfo.deleted",
            NotificationEvent::AlarmRaised { .. } => "alarm.raised",
            NotificationEvent::AlarmChanged { .. } => "alarm.changed",
            NotificationEvent::AlarmCleared { .. } => "alarm.cleared",
        }
    }
}

/// Commands for the ThresholdEvaluator actor
#[derive(Debug)]
pub enum EvaluatorCommand {
    /// Run an evaluation cycle immediately (bypassing the interval timer)
    ///
    /// Used for testing and manual triggers. The cycle runs on the actor's
    /// own task, so it never overlaps a timer-driven cycle.
    RunNow {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Get a snapshot of the evaluator's bookkeeping
    GetState {
        respond_to: oneshot::Sender<EvaluatorState>,
    },

    /// Gracefully shut down the evaluator
    Shutdown,
}

/// Snapshot of evaluator bookkeeping, for tests and diagnostics
#[derive(Debug, Clone)]
pub struct EvaluatorState {
    /// Number of currently open alarms in the registry
    pub open_alarms: usize,

    /// When the last evaluation cycle completed
    pub last_cycle: Option<DateTime<Utc>>,
}

/// Commands for the NotificationDispatcher actor
#[derive(Debug)]
pub enum DispatcherCommand {
    /// Gracefully shut down the worker
    ///
    /// Events still queued are dropped; an in-flight delivery finishes
    /// its current attempt.
    Shutdown,
}

/// Commands for the ReportAggregator actor
#[derive(Debug)]
pub enum ReporterCommand {
    /// Generate and deliver a report for one job immediately, regardless
    /// of its reporting period
    ReportNow {
        job_id: String,
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Gracefully shut down the aggregator
    Shutdown,
}
