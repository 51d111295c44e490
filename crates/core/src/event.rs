//! Progress events — an observation channel for external reporters.
//!
//! The driver publishes one event per committed transition. Nothing in the
//! runtime depends on anyone listening.

use crate::kind::StateKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A completed transition, as seen by a progress reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this step belongs to
    pub run_id: Uuid,

    /// 1-based step index within the run
    pub step: usize,

    /// Kind of the state that just executed
    pub from: StateKind,

    /// Kind of the state it produced
    pub to: StateKind,

    /// Content of the newest memory entry after the step
    pub latest: String,

    pub timestamp: DateTime<Utc>,
}

/// A broadcast-based bus for progress events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and drop events instead of blocking the run.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
