//! Actor-based monitoring core
//!
//! The three periodic loops run as independent async tasks communicating
//! via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   discovery / API layer (external)
//!        │ samples, resources,            ┌──────────────────────┐
//!        │ subscriptions, jobs            │  shared stores       │
//!        └───────────────────────────────▶│  (Arc<dyn ...Store>) │
//!                                         └──────────┬───────────┘
//!                                                    │
//!             ┌──────────────────┬──────────────────┬┘
//!             │                  │                  │
//!    ┌────────▼────────┐ ┌──────▼──────────┐ ┌─────▼────────────┐
//!    │ Threshold       │ │ Notification    │ │ Report           │
//!    │ Evaluator       │ │ Dispatcher      │ │ Aggregator       │
//!    │ (60s cycle)     │ │ (event queue)   │ │ (10s check)      │
//!    └────────┬────────┘ └──────┬──────────┘ └─────┬────────────┘
//!             │ enqueue events  │ POST             │ POST
//!             └────────────────▶│                  │
//!                        subscriber callbacks   job callbacks
//! ```
//!
//! ## Actor Types
//!
//! - **ThresholdEvaluator**: samples recent metrics, drives the alarm
//!   lifecycle, owns the open-alarm registry
//! - **NotificationDispatcher**: single worker draining the event queue,
//!   matching subscriptions, delivering with retries
//! - **ReportAggregator**: checks performance jobs and delivers metric
//!   rollups to job callbacks
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control
//!    messages (shutdown, manual triggers)
//! 2. **Events**: producers push `NotificationEvent`s into the
//!    dispatcher's unbounded queue; the queue is transient and lost on
//!    restart
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod dispatcher;
pub mod evaluator;
pub mod messages;
pub mod reporter;
