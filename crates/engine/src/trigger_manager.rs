//! Long-lived trigger monitoring with admission control and bounded
//! pending queues.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use weft_core::{NodeId, WorkflowId};
use weft_node::{Node, NodeRegistry, TriggerCallback};
use weft_workflow::WorkflowDefinition;

use crate::error::EngineError;
use crate::orchestrator::ExecutionLauncher;
use crate::settings::ExecutionSettings;
use crate::storage::{ExecutionStore, WorkflowStore};

/// What [`TriggerManager::activate_workflow`] reports back.
#[derive(Debug, Clone)]
pub struct ActivationInfo {
    /// The activated workflow.
    pub workflow_id: WorkflowId,
    /// How many trigger nodes are now monitoring.
    pub trigger_count: usize,
    /// The monitoring trigger nodes, in definition order.
    pub trigger_nodes: Vec<NodeId>,
    /// When monitoring started.
    pub started_at: DateTime<Utc>,
}

struct ActiveWorkflow {
    definition: Arc<WorkflowDefinition>,
    triggers: HashMap<NodeId, Arc<dyn Node>>,
    started_at: DateTime<Utc>,
}

struct QueuedEvent {
    trigger_data: serde_json::Value,
    execution_source: String,
    queued_at: DateTime<Utc>,
}

/// Owns trigger monitoring for activated workflows.
///
/// One manager per process. Activation instantiates every
/// TRIGGERS-category node of a workflow and starts its monitoring task;
/// when a trigger fires, the manager admits the execution against the
/// per-workflow concurrency cap or parks the event in a bounded FIFO
/// queue. Queues drop the newest event at ingress when full — a slow
/// workflow never blocks its trigger, and earlier-queued work is
/// preserved.
pub struct TriggerManager {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: Arc<NodeRegistry>,
    launcher: Arc<dyn ExecutionLauncher>,
    settings: ExecutionSettings,
    active: Mutex<HashMap<WorkflowId, ActiveWorkflow>>,
    queues: Mutex<HashMap<WorkflowId, VecDeque<QueuedEvent>>>,
    dropped_events: AtomicU64,
    /// Weak self-reference baked into trigger callbacks, so a forgotten
    /// monitoring task cannot keep the manager alive.
    self_ref: Weak<Self>,
}

impl TriggerManager {
    /// Create a trigger manager.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        registry: Arc<NodeRegistry>,
        launcher: Arc<dyn ExecutionLauncher>,
        settings: ExecutionSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            workflows,
            executions,
            registry,
            launcher,
            settings,
            active: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            dropped_events: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    /// Activate trigger monitoring for a workflow.
    ///
    /// Instantiates every TRIGGERS-category node, verifies it implements
    /// the trigger capability, and starts monitoring. Any failure rolls
    /// back the triggers already started and surfaces as
    /// [`EngineError::ActivationFailed`].
    pub async fn activate_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<ActivationInfo, EngineError> {
        let mut active = self.active.lock().await;
        if active.contains_key(&workflow_id) {
            return Err(EngineError::AlreadyActive(workflow_id));
        }

        let definition = self
            .workflows
            .get(workflow_id)
            .await
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        let trigger_configs: Vec<_> = definition.trigger_nodes().cloned().collect();
        if trigger_configs.is_empty() {
            return Err(EngineError::NoTriggers(workflow_id));
        }
        tracing::info!(
            %workflow_id,
            trigger_count = trigger_configs.len(),
            "activating workflow"
        );

        let callback = self.trigger_callback();
        let mut triggers: HashMap<NodeId, Arc<dyn Node>> = HashMap::new();
        for config in &trigger_configs {
            let started: Result<Arc<dyn Node>, EngineError> = async {
                let node = self.registry.instantiate(config)?;
                {
                    let trigger = node
                        .as_trigger()
                        .ok_or(EngineError::NotATrigger(config.id))?;
                    trigger
                        .start_monitoring(workflow_id, Arc::clone(&callback))
                        .await?;
                }
                Ok(node)
            }
            .await;

            match started {
                Ok(node) => {
                    tracing::info!(node_id = %config.id, "trigger monitoring started");
                    triggers.insert(config.id, node);
                }
                Err(err) => {
                    tracing::error!(node_id = %config.id, error = %err, "trigger failed to start");
                    self.stop_triggers(&triggers).await;
                    return Err(EngineError::ActivationFailed {
                        workflow_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.workflows.mark_monitoring_started(workflow_id).await;

        let started_at = Utc::now();
        let info = ActivationInfo {
            workflow_id,
            trigger_count: triggers.len(),
            trigger_nodes: trigger_configs.iter().map(|c| c.id).collect(),
            started_at,
        };
        active.insert(
            workflow_id,
            ActiveWorkflow {
                definition,
                triggers,
                started_at,
            },
        );
        Ok(info)
    }

    /// Deactivate trigger monitoring for a workflow.
    ///
    /// Stops every trigger (errors logged, not propagated), discards
    /// queued events, and persists the stop. Returns `false` when the
    /// workflow was not active.
    pub async fn deactivate_workflow(&self, workflow_id: WorkflowId) -> bool {
        let Some(workflow) = self.active.lock().await.remove(&workflow_id) else {
            tracing::warn!(%workflow_id, "deactivation requested for inactive workflow");
            return false;
        };

        self.stop_triggers(&workflow.triggers).await;

        let drained = self
            .queues
            .lock()
            .await
            .remove(&workflow_id)
            .map_or(0, |q| q.len());
        if drained > 0 {
            tracing::info!(%workflow_id, drained, "discarded queued trigger events");
        }

        self.workflows.mark_monitoring_stopped(workflow_id).await;
        tracing::info!(%workflow_id, "workflow deactivated");
        true
    }

    /// Deactivate every active workflow.
    pub async fn shutdown(&self) {
        let workflow_ids: Vec<WorkflowId> =
            self.active.lock().await.keys().copied().collect();
        tracing::info!(count = workflow_ids.len(), "trigger manager shutting down");
        for workflow_id in workflow_ids {
            self.deactivate_workflow(workflow_id).await;
        }
    }

    /// Whether a workflow's triggers are currently monitoring.
    pub async fn is_workflow_active(&self, workflow_id: WorkflowId) -> bool {
        self.active.lock().await.contains_key(&workflow_id)
    }

    /// Snapshot of the active workflows: name, triggers, start time,
    /// uptime.
    pub async fn get_active_workflows(&self) -> HashMap<WorkflowId, serde_json::Value> {
        let active = self.active.lock().await;
        let now = Utc::now();
        active
            .iter()
            .map(|(&workflow_id, workflow)| {
                let uptime_seconds =
                    (now - workflow.started_at).num_milliseconds() as f64 / 1000.0;
                (
                    workflow_id,
                    serde_json::json!({
                        "workflow_name": workflow.definition.name,
                        "trigger_count": workflow.triggers.len(),
                        "trigger_nodes": workflow.triggers.keys().collect::<Vec<_>>(),
                        "started_at": workflow.started_at,
                        "uptime_seconds": uptime_seconds,
                    }),
                )
            })
            .collect()
    }

    /// Queued trigger events for a workflow.
    pub async fn queued_count(&self, workflow_id: WorkflowId) -> usize {
        self.queues
            .lock()
            .await
            .get(&workflow_id)
            .map_or(0, VecDeque::len)
    }

    /// Trigger events dropped because a queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// The callback handed to every trigger of an activation.
    fn trigger_callback(&self) -> TriggerCallback {
        let manager = self.self_ref.clone();
        Arc::new(move |workflow_id, trigger_data, execution_source| {
            let manager = manager.clone();
            Box::pin(async move {
                if let Some(manager) = manager.upgrade() {
                    manager
                        .handle_trigger_fired(workflow_id, trigger_data, execution_source)
                        .await;
                }
            })
        })
    }

    /// Admission check for one fired trigger event: run now, queue, or
    /// drop.
    async fn handle_trigger_fired(
        &self,
        workflow_id: WorkflowId,
        trigger_data: serde_json::Value,
        execution_source: String,
    ) {
        tracing::info!(%workflow_id, execution_source, "trigger fired");

        let definition = {
            let active = self.active.lock().await;
            active.get(&workflow_id).map(|w| Arc::clone(&w.definition))
        };
        let Some(definition) = definition else {
            tracing::warn!(%workflow_id, "trigger fired for inactive workflow, ignoring");
            return;
        };

        let active_count = self.executions.count_running(workflow_id).await;
        let max_concurrent = self.settings.max_concurrent_runs(&definition.overrides);

        if active_count >= max_concurrent {
            let mut queues = self.queues.lock().await;
            let queue = queues.entry(workflow_id).or_default();
            if queue.len() >= self.settings.max_queue_depth_per_workflow {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    %workflow_id,
                    capacity = self.settings.max_queue_depth_per_workflow,
                    "trigger queue full, dropping event"
                );
            } else {
                queue.push_back(QueuedEvent {
                    trigger_data,
                    execution_source,
                    queued_at: Utc::now(),
                });
                tracing::info!(
                    %workflow_id,
                    active_count,
                    max_concurrent,
                    queue_len = queue.len(),
                    "at concurrency limit, trigger event queued"
                );
            }
            return;
        }

        self.run_and_drain(workflow_id, trigger_data, execution_source)
            .await;
    }

    /// Run one execution, then keep draining queued events one at a time
    /// while capacity allows.
    async fn run_and_drain(
        &self,
        workflow_id: WorkflowId,
        mut trigger_data: serde_json::Value,
        mut execution_source: String,
    ) {
        loop {
            match self
                .launcher
                .launch(workflow_id, Some(trigger_data), &execution_source)
                .await
            {
                Ok(execution_id) => {
                    tracing::info!(%workflow_id, %execution_id, "triggered execution finished");
                }
                Err(err) => {
                    tracing::error!(%workflow_id, error = %err, "triggered execution failed");
                }
            }

            // Always check the queue after a run, success or failure.
            match self.next_queued(workflow_id).await {
                Some(event) => {
                    trigger_data = event.trigger_data;
                    execution_source = event.execution_source;
                }
                None => break,
            }
        }
    }

    /// Pop the next queued event, if the workflow is still active and has
    /// capacity for it.
    async fn next_queued(&self, workflow_id: WorkflowId) -> Option<QueuedEvent> {
        let definition = {
            let active = self.active.lock().await;
            active.get(&workflow_id).map(|w| Arc::clone(&w.definition))
        }?;

        {
            let queues = self.queues.lock().await;
            if queues.get(&workflow_id).is_none_or(VecDeque::is_empty) {
                return None;
            }
        }

        let active_count = self.executions.count_running(workflow_id).await;
        let max_concurrent = self.settings.max_concurrent_runs(&definition.overrides);
        if active_count >= max_concurrent {
            tracing::debug!(
                %workflow_id,
                active_count,
                max_concurrent,
                "still at concurrency limit, queue remains"
            );
            return None;
        }

        let mut queues = self.queues.lock().await;
        let queue = queues.get_mut(&workflow_id)?;
        let event = queue.pop_front()?;
        let waited_ms = (Utc::now() - event.queued_at).num_milliseconds();
        tracing::info!(
            %workflow_id,
            waited_ms,
            remaining = queue.len(),
            "processing queued trigger event"
        );
        Some(event)
    }

    async fn stop_triggers(&self, triggers: &HashMap<NodeId, Arc<dyn Node>>) {
        for (node_id, node) in triggers {
            let Some(trigger) = node.as_trigger() else {
                continue;
            };
            match trigger.stop_monitoring().await {
                Ok(()) => tracing::info!(%node_id, "trigger monitoring stopped"),
                Err(err) => tracing::error!(%node_id, error = %err, "error stopping trigger"),
            }
        }
    }
}
