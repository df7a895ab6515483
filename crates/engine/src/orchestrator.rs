//! One-shot execution lifecycle and the active-run table.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use weft_core::{ExecutionId, UserId, WorkflowId};
use weft_execution::{ExecutionContext, ExecutionMode, ExecutionRecord, ExecutionStatus};
use weft_node::{CredentialResolver, NodeRegistry, PortMap};
use weft_telemetry::{EventBus, ExecutionEvent};
use weft_workflow::validate;

use crate::error::EngineError;
use crate::executor::{ExecutorHandle, ParallelExecutor, SharedContext};
use crate::settings::ExecutionSettings;
use crate::storage::{ExecutionStore, WorkflowStore};

/// Entry point for launching executions, used by the API layer and the
/// trigger manager.
#[async_trait]
pub trait ExecutionLauncher: Send + Sync {
    /// Launch a run of the given workflow and wait for it to finish.
    async fn launch(
        &self,
        workflow_id: WorkflowId,
        trigger_data: Option<serde_json::Value>,
        execution_source: &str,
    ) -> Result<ExecutionId, EngineError>;
}

struct ActiveRun {
    handle: ExecutorHandle,
    finished: watch::Receiver<bool>,
}

/// Per-request façade over the execution subsystem.
///
/// Loads the workflow, merges execution config, runs the executor, and
/// guarantees the execution record reaches a terminal state. Running
/// executions are registered in an in-memory table keyed by execution id
/// so external callers can cancel, pause, and resolve interactions; the
/// table holds control handles, not the executor itself.
pub struct Orchestrator {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: Arc<NodeRegistry>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    settings: ExecutionSettings,
    events: Arc<EventBus>,
    active: DashMap<ExecutionId, ActiveRun>,
}

impl Orchestrator {
    /// Create an orchestrator over the given stores and registry.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        registry: Arc<NodeRegistry>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            workflows,
            executions,
            registry,
            credentials: None,
            settings,
            events: Arc::new(EventBus::default()),
            active: DashMap::new(),
        }
    }

    /// Attach a credential resolver.
    #[must_use]
    pub fn with_credentials(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(resolver);
        self
    }

    /// Attach an event bus.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// The event bus executions publish to.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Execute a workflow to a terminal state.
    ///
    /// Inserts a RUNNING execution record up front; whatever happens, the
    /// record reaches a terminal status before this returns. The returned
    /// id identifies the (finished) run.
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        trigger_data: Option<serde_json::Value>,
        execution_source: &str,
        started_by: Option<UserId>,
    ) -> Result<ExecutionId, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        validate(&workflow)?;

        let config = self.settings.executor_config(&workflow.overrides);
        let execution_id = ExecutionId::v4();

        let record = ExecutionRecord::started(
            execution_id,
            workflow_id,
            execution_source,
            ExecutionMode::Parallel,
        );
        self.executions.insert(record.clone()).await;

        let mut ctx = ExecutionContext::new(workflow_id, execution_id)
            .with_source(execution_source)
            .with_initial_variables(workflow.variables.clone());
        if let Some(data) = trigger_data {
            ctx = ctx.with_trigger_data(data);
        }
        if let Some(user) = started_by {
            ctx = ctx.with_started_by(user);
        }
        let context: SharedContext = Arc::new(RwLock::new(ctx));

        tracing::info!(%execution_id, %workflow_id, execution_source, "executing workflow");

        let mut executor = ParallelExecutor::new(config, Arc::clone(&self.registry))
            .with_events(Arc::clone(&self.events));
        if let Some(resolver) = &self.credentials {
            executor = executor.with_credentials(Arc::clone(resolver));
        }

        let (finished_tx, finished_rx) = watch::channel(false);
        let handle = executor.handle(Arc::clone(&context));
        self.active.insert(
            execution_id,
            ActiveRun {
                handle,
                finished: finished_rx,
            },
        );

        // Registered before the started event goes out, so a subscriber
        // reacting to it can immediately cancel or pause.
        self.events.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            workflow_id,
            execution_source: execution_source.to_owned(),
        });

        let status = executor
            .run(Arc::clone(&workflow), Arc::clone(&context))
            .await;

        let mut record = record;
        let duration_ms = {
            let ctx = context.read();
            if let Err(err) = record.absorb(status, &ctx) {
                tracing::error!(%execution_id, error = %err, "failed to fold terminal state");
            }
            ctx.duration_ms().unwrap_or(0)
        };
        self.executions.update(record).await;
        self.active.remove(&execution_id);
        let _ = finished_tx.send(true);

        self.events.emit(ExecutionEvent::ExecutionCompleted {
            execution_id,
            status: status.to_string(),
            duration_ms,
        });
        tracing::info!(%execution_id, %status, duration_ms, "workflow execution finished");

        Ok(execution_id)
    }

    /// Request cancellation of a running or paused execution and wait for
    /// its terminal transition.
    ///
    /// Returns `false` when the execution exists but is already terminal.
    pub async fn cancel_execution(&self, execution_id: ExecutionId) -> Result<bool, EngineError> {
        let record = self
            .executions
            .get(execution_id)
            .await
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        if !matches!(
            record.status,
            ExecutionStatus::Running | ExecutionStatus::Paused
        ) {
            return Ok(false);
        }

        let Some((handle, mut finished)) = self
            .active
            .get(&execution_id)
            .map(|run| (run.handle.clone(), run.finished.clone()))
        else {
            // The record claims RUNNING but no executor is registered
            // (e.g. a stale record from a previous process). Settle it.
            let mut record = record;
            record.transition_to(ExecutionStatus::Cancelled)?;
            self.executions.update(record).await;
            return Ok(true);
        };

        handle.cancel();
        while !*finished.borrow_and_update() {
            if finished.changed().await.is_err() {
                break;
            }
        }
        Ok(true)
    }

    /// Pause a running execution. Returns `false` when it is not active.
    #[must_use]
    pub fn pause_execution(&self, execution_id: ExecutionId) -> bool {
        self.active.get(&execution_id).is_some_and(|run| {
            run.handle.pause();
            true
        })
    }

    /// Resume a paused execution. Returns `false` when it is not active.
    #[must_use]
    pub fn resume_execution(&self, execution_id: ExecutionId) -> bool {
        self.active.get(&execution_id).is_some_and(|run| {
            run.handle.resume();
            true
        })
    }

    /// Resolve a pending human interaction on a suspended execution.
    ///
    /// Returns `false` when the execution is active but no pending
    /// interaction matches the id.
    pub fn resolve_interaction(
        &self,
        execution_id: ExecutionId,
        interaction_id: &str,
        outputs: PortMap,
    ) -> Result<bool, EngineError> {
        let run = self
            .active
            .get(&execution_id)
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        Ok(run.handle.resolve_interaction(interaction_id, outputs))
    }

    /// Status snapshot for an execution: live state for active runs, the
    /// persisted record otherwise. `None` when the id is unknown.
    pub async fn get_execution_status(
        &self,
        execution_id: ExecutionId,
    ) -> Option<serde_json::Value> {
        if let Some(run) = self.active.get(&execution_id) {
            let status = if run.handle.is_paused() {
                ExecutionStatus::Paused
            } else {
                ExecutionStatus::Running
            };
            let ctx = run.handle.context().read();
            return Some(serde_json::json!({
                "execution_id": execution_id,
                "workflow_id": ctx.workflow_id,
                "status": status.to_string(),
                "started_at": ctx.started_at,
                "progress": ctx.progress.snapshot(),
                "pending_interactions": ctx.pending_interactions.len(),
            }));
        }

        let record = self.executions.get(execution_id).await?;
        Some(serde_json::json!({
            "execution_id": record.execution_id,
            "workflow_id": record.workflow_id,
            "status": record.status.to_string(),
            "started_at": record.started_at,
            "completed_at": record.completed_at,
            "execution_source": record.execution_source,
            "execution_metadata": record.execution_metadata,
        }))
    }
}

#[async_trait]
impl ExecutionLauncher for Orchestrator {
    async fn launch(
        &self,
        workflow_id: WorkflowId,
        trigger_data: Option<serde_json::Value>,
        execution_source: &str,
    ) -> Result<ExecutionId, EngineError> {
        self.execute_workflow(workflow_id, trigger_data, execution_source, None)
            .await
    }
}
