//! Execution lifecycle events and the broadcast bus.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use weft_core::{ExecutionId, NodeId, WorkflowId};

/// An execution lifecycle event emitted by the engine.
///
/// Payloads are deliberately minimal — consumers that need the full
/// picture query the execution record by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A run has started.
    ExecutionStarted {
        /// The run.
        execution_id: ExecutionId,
        /// The workflow being run.
        workflow_id: WorkflowId,
        /// How the run was initiated.
        execution_source: String,
    },
    /// A run reached a terminal state.
    ExecutionCompleted {
        /// The run.
        execution_id: ExecutionId,
        /// Terminal status, serialized (`"completed"`, `"failed"`, …).
        status: String,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
    },
    /// A node finished (successfully or not).
    NodeComplete {
        /// The run.
        execution_id: ExecutionId,
        /// The node that finished.
        node_id: NodeId,
        /// Whether it succeeded.
        success: bool,
    },
    /// A node suspended on a human interaction.
    InteractionPending {
        /// The run.
        execution_id: ExecutionId,
        /// The suspended node.
        node_id: NodeId,
        /// Identifier the external caller resolves.
        interaction_id: String,
    },
}

/// Broadcast-based event bus.
///
/// Delivers each event to all active subscribers; with no subscribers,
/// events vanish silently. Lagging subscribers skip missed events rather
/// than stalling the engine.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: ExecutionEvent) {
        // No receivers is fine — fire and forget.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription handle for receiving events from the [`EventBus`].
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: broadcast::Receiver<ExecutionEvent>,
}

impl EventSubscriber {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Skips over lagged gaps; returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an event without blocking, if one is ready.
    pub fn try_recv(&mut self) -> Option<ExecutionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
