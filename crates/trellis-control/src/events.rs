//! Controller event stream
//!
//! Every reconcile step is published as a [`ControllerEventEnvelope`] on a
//! broadcast channel. Sending never blocks and never fails the caller; with
//! no subscribers the event is dropped.

use tokio::sync::broadcast;
use tracing::debug;
use trellis_types::{ControllerEvent, ControllerEventEnvelope};

/// Channel capacity for the event stream
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Publishes controller events
#[derive(Debug, Clone)]
pub struct EventBus {
    controller: &'static str,
    tx: broadcast::Sender<ControllerEventEnvelope>,
}

impl EventBus {
    pub fn new(controller: &'static str) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { controller, tx }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEventEnvelope> {
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn emit(&self, event: ControllerEvent) {
        let envelope = ControllerEventEnvelope::new(self.controller, event);
        debug!(
            event_id = %envelope.id,
            key = %envelope.event.key(),
            severity = ?envelope.severity,
            "Controller event"
        );
        // No subscribers is fine
        let _ = self.tx.send(envelope);
    }
}
