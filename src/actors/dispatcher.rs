//! NotificationDispatcher - delivers queued events to subscribers
//!
//! A single worker task drains an unbounded event queue, matches each
//! event against the registered subscriptions, and POSTs an envelope to
//! every matching callback with retries. One event is processed at a
//! time, so ordering is preserved per producer; producers racing to
//! enqueue interleave in arrival order.
//!
//! ## Message Flow
//!
//! ```text
//! producers ──▶ event queue ──▶ worker ──▶ filter match ──▶ HTTP POST
//!                                  ▲
//!                                  └── Commands (Shutdown)
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::notify::filter::{matches_alarm_filter, matches_resource_filter};
use crate::notify::{NotificationSender, payload};
use crate::storage::{AlarmStore, ResourceInventory, SubscriptionStore};
use crate::{Resource, Subscription};

use super::messages::{DispatcherCommand, NotificationEvent};

/// Worker that processes the notification queue.
pub struct NotificationDispatcher {
    /// Event queue receiver
    event_rx: mpsc::UnboundedReceiver<NotificationEvent>,

    /// Command receiver
    command_rx: mpsc::Receiver<DispatcherCommand>,

    subscriptions: Arc<dyn SubscriptionStore>,
    alarms: Arc<dyn AlarmStore>,
    inventory: Arc<dyn ResourceInventory>,

    sender: NotificationSender,
}

impl NotificationDispatcher {
    pub fn new(
        event_rx: mpsc::UnboundedReceiver<NotificationEvent>,
        command_rx: mpsc::Receiver<DispatcherCommand>,
        subscriptions: Arc<dyn SubscriptionStore>,
        alarms: Arc<dyn AlarmStore>,
        inventory: Arc<dyn ResourceInventory>,
        sender: NotificationSender,
    ) -> Self {
        Self {
            event_rx,
            command_rx,
            subscriptions,
            alarms,
            inventory,
            sender,
        }
    }

    /// Run the worker loop until shutdown or all producers are gone.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting notification dispatcher");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.process_event(event).await,
                        None => {
                            warn!("event queue closed, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        DispatcherCommand::Shutdown => {
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

        debug!("notification dispatcher stopped");
    }

    /// Process a single event: resolve context, match filters, deliver.
    ///
    /// Every event instance gets one notification id, shared across all
    /// subscribers it fans out to.
    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    async fn process_event(&self, event: NotificationEvent) {
        let notification_id = format!("notif-{}", Uuid::new_v4());

        match &event {
            NotificationEvent::ResourceCreated { resource_id, data }
            | NotificationEvent::ResourceUpdated { resource_id, data } => {
                self.deliver_resource_event(&event, resource_id, data, &notification_id)
                    .await;
            }
            NotificationEvent::ResourceDeleted { resource_id } => {
                self.deliver_resource_event(
                    &event,
                    resource_id,
                    &serde_json::Value::Object(Default::default()),
                    &notification_id,
                )
                .await;
            }
            NotificationEvent::AlarmRaised { alarm_id }
            | NotificationEvent::AlarmChanged { alarm_id }
            | NotificationEvent::AlarmCleared { alarm_id } => {
                self.deliver_alarm_event(&event, alarm_id, &notification_id)
                    .await;
            }
        }
    }

    async fn deliver_resource_event(
        &self,
        event: &NotificationEvent,
        resource_id: &str,
        data: &serde_json::Value,
        notification_id: &str,
    ) {
        // Filters compare against the resource's current stored state,
        // not the event payload. A deleted resource resolves to None.
        let resource = match self.inventory.get_resource(resource_id).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!("inventory lookup for {resource_id} failed: {e}");
                None
            }
        };

        for subscription in self.matching_subscriptions(resource.as_ref()).await {
            let body = payload::resource_notification(
                event.event_type(),
                resource_id,
                data,
                notification_id,
                &subscription.subscription_id,
            );

            if let Err(e) = self.sender.send(&subscription.callback_uri, &body).await {
                warn!(
                    "dropping {} notification for subscription {}: {e}",
                    event.event_type(),
                    subscription.subscription_id
                );
            }
        }
    }

    async fn deliver_alarm_event(
        &self,
        event: &NotificationEvent,
        alarm_id: &str,
        notification_id: &str,
    ) {
        let alarm = match self.alarms.get(alarm_id).await {
            Ok(Some(alarm)) => alarm,
            Ok(None) => {
                // Raced with a deletion; nothing to deliver.
                trace!("alarm {alarm_id} no longer exists, dropping event");
                return;
            }
            Err(e) => {
                warn!("alarm lookup for {alarm_id} failed: {e}");
                return;
            }
        };

        let subscriptions = match self.subscriptions.list(None).await {
            Ok(subs) => subs,
            Err(e) => {
                warn!("subscription listing failed: {e}");
                return;
            }
        };

        for subscription in subscriptions {
            if !matches_alarm_filter(subscription.filter.as_ref(), &alarm.resource_id) {
                continue;
            }

            let body = payload::alarm_notification(
                event.event_type(),
                &alarm,
                notification_id,
                &subscription.subscription_id,
            );

            if let Err(e) = self.sender.send(&subscription.callback_uri, &body).await {
                warn!(
                    "dropping {} notification for subscription {}: {e}",
                    event.event_type(),
                    subscription.subscription_id
                );
            }
        }
    }

    async fn matching_subscriptions(&self, resource: Option<&Resource>) -> Vec<Subscription> {
        let subscriptions = match self.subscriptions.list(None).await {
            Ok(subs) => subs,
            Err(e) => {
                warn!("subscription listing failed: {e}");
                return vec![];
            }
        };

        subscriptions
            .into_iter()
            .filter(|sub| matches_resource_filter(sub.filter.as_ref(), resource))
            .collect()
    }
}

/// Handle for enqueueing events and controlling the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    event_tx: mpsc::UnboundedSender<NotificationEvent>,
    command_tx: mpsc::Sender<DispatcherCommand>,
}

impl DispatcherHandle {
    /// Spawn the dispatcher worker, returning a handle and the task's
    /// join handle for bounded shutdown.
    pub fn spawn(
        subscriptions: Arc<dyn SubscriptionStore>,
        alarms: Arc<dyn AlarmStore>,
        inventory: Arc<dyn ResourceInventory>,
        sender: NotificationSender,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(8);

        let actor = NotificationDispatcher::new(
            event_rx,
            command_rx,
            subscriptions,
            alarms,
            inventory,
            sender,
        );

        let join = tokio::spawn(actor.run());

        (
            Self {
                event_tx,
                command_tx,
            },
            join,
        )
    }

    /// Enqueue an event for delivery.
    ///
    /// Enqueueing never blocks; if the worker is gone the event is
    /// silently dropped (delivery is best-effort).
    pub fn publish(&self, event: NotificationEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("dispatcher gone, dropping notification event");
        }
    }

    pub fn notify_resource_created(&self, resource_id: impl Into<String>, data: serde_json::Value) {
        self.publish(NotificationEvent::ResourceCreated {
            resource_id: resource_id.into(),
            data,
        });
    }

    pub fn notify_resource_updated(&self, resource_id: impl Into<String>, data: serde_json::Value) {
        self.publish(NotificationEvent::ResourceUpdated {
            resource_id: resource_id.into(),
            data,
        });
    }

    pub fn notify_resource_deleted(&self, resource_id: impl Into<String>) {
        self.publish(NotificationEvent::ResourceDeleted {
            resource_id: resource_id.into(),
        });
    }

    pub fn notify_alarm_raised(&self, alarm_id: impl Into<String>) {
        self.publish(NotificationEvent::AlarmRaised {
            alarm_id: alarm_id.into(),
        });
    }

    pub fn notify_alarm_changed(&self, alarm_id: impl Into<String>) {
        self.publish(NotificationEvent::AlarmChanged {
            alarm_id: alarm_id.into(),
        });
    }

    pub fn notify_alarm_cleared(&self, alarm_id: impl Into<String>) {
        self.publish(NotificationEvent::AlarmCleared {
            alarm_id: alarm_id.into(),
        });
    }

    /// Request a graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(DispatcherCommand::Shutdown).await;
    }
}
