//! Broadcast event port
//!
//! Every committed mutation emits exactly one [`QueueEvent`] after the state
//! change is durable. The channel is strictly one-way: the engine never
//! consumes its own events, and a lagging or absent subscriber never affects
//! the mutation that produced the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::entry::QueueEntry;

/// What happened to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    /// A new entry joined the queue
    Admitted,
    /// An entry was called up to a staff member
    Called,
    /// An entry moved between lifecycle states or had its position changed
    StatusChanged,
    /// An entry was removed from the live queue (cancelled, kept for history)
    Removed,
}

/// One committed mutation, as seen by subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    /// Post-mutation snapshot of the affected entry
    pub entry: QueueEntry,
    /// Session occupancy after the mutation
    pub occupancy: u32,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out sender for queue events
///
/// Cloneable handle over a `tokio::sync::broadcast` channel. Subscribers that
/// fall behind by more than the channel capacity miss the overwritten events;
/// no event is ever redelivered.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<QueueEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBroadcaster { sender }
    }

    /// Open a new subscription starting at the next event
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Publish an event
    ///
    /// A send error only means there are no subscribers right now; the
    /// mutation already committed, so it is dropped without complaint.
    pub fn emit(&self, event: QueueEvent) {
        let _ = self.sender.send(event);
        trace!("📤 Broadcast queue event");
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
