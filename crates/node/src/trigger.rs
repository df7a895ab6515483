//! Trigger capability for long-lived event sources.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use weft_core::WorkflowId;

use crate::error::NodeError;

/// Callback a trigger invokes when it fires.
///
/// Arguments: the workflow to launch, the trigger payload, and the
/// execution source label (e.g. `"schedule"`, `"webhook"`). Supplied by
/// the trigger manager; admission and queueing happen on the other side.
pub type TriggerCallback =
    Arc<dyn Fn(WorkflowId, serde_json::Value, String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Optional capability for nodes in the TRIGGERS category.
///
/// A trigger owns a monitoring task (timer loop, mailbox poller, file
/// watcher) between `start_monitoring` and `stop_monitoring`. Firing the
/// callback is fire-and-forget from the trigger's perspective — a full
/// queue or a concurrency cap never blocks the monitoring loop.
#[async_trait]
pub trait TriggerNode: Send + Sync {
    /// Start the monitoring task for the given workflow.
    ///
    /// Called once per activation. Implementations spawn their own task
    /// and return promptly.
    async fn start_monitoring(
        &self,
        workflow_id: WorkflowId,
        callback: TriggerCallback,
    ) -> Result<(), NodeError>;

    /// Stop the monitoring task and release its resources.
    ///
    /// Idempotent: stopping an already-stopped trigger is not an error.
    async fn stop_monitoring(&self) -> Result<(), NodeError>;
}
