//! Broadcast event bus.
//!
//! Outbound stream of state-change events consumed by dashboards and
//! tests. Delivery is best-effort: a slow or disconnected subscriber only
//! lags or drops its own copy and never blocks the publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::domain::models::{EventPayload, OrchestratorEvent, SequenceNumber};

/// Configuration for the event bus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Central event bus fanning events out to any number of subscribers.
pub struct EventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event, assigning it the next sequence number.
    ///
    /// Send errors (no subscribers) are ignored.
    pub fn publish(&self, project_id: Option<String>, payload: EventPayload) {
        let mut event = OrchestratorEvent::new(project_id, payload);
        event.sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// The next sequence number to be assigned.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
