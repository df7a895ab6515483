//! Persistence ports and their in-memory implementations.
//!
//! The engine only depends on these traits; the surrounding application
//! maps them onto its database. The in-memory variants back tests and
//! single-process deployments.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use weft_core::{ExecutionId, WorkflowId};
use weft_execution::{ExecutionRecord, ExecutionStatus};
use weft_workflow::WorkflowDefinition;

/// Monitoring lifecycle state persisted per workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringState {
    /// Persisted workflow status (`Pending` while monitored, `Stopped`
    /// after deactivation).
    pub status: ExecutionStatus,
    /// When monitoring started, if it ever did.
    pub monitoring_started_at: Option<DateTime<Utc>>,
    /// When monitoring stopped, if it did.
    pub monitoring_stopped_at: Option<DateTime<Utc>>,
}

/// Port for loading and updating workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load a workflow definition by id.
    async fn get(&self, id: WorkflowId) -> Option<Arc<WorkflowDefinition>>;

    /// Insert or replace a workflow definition.
    async fn insert(&self, workflow: WorkflowDefinition);

    /// Persist that trigger monitoring started for a workflow.
    async fn mark_monitoring_started(&self, id: WorkflowId);

    /// Persist that trigger monitoring stopped for a workflow.
    async fn mark_monitoring_stopped(&self, id: WorkflowId);

    /// The persisted monitoring state, if the workflow exists.
    async fn monitoring_state(&self, id: WorkflowId) -> Option<MonitoringState>;
}

/// Port for persisting execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution record.
    async fn insert(&self, record: ExecutionRecord);

    /// Replace an existing execution record.
    async fn update(&self, record: ExecutionRecord);

    /// Load an execution record by id.
    async fn get(&self, id: ExecutionId) -> Option<ExecutionRecord>;

    /// Number of executions currently RUNNING for a workflow. Drives
    /// trigger admission.
    async fn count_running(&self, workflow_id: WorkflowId) -> usize;
}

struct StoredWorkflow {
    definition: Arc<WorkflowDefinition>,
    monitoring: MonitoringState,
}

/// In-memory workflow store.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: DashMap<WorkflowId, StoredWorkflow>,
}

impl InMemoryWorkflowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, id: WorkflowId) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.get(&id).map(|w| Arc::clone(&w.definition))
    }

    async fn insert(&self, workflow: WorkflowDefinition) {
        self.workflows.insert(
            workflow.id,
            StoredWorkflow {
                definition: Arc::new(workflow),
                monitoring: MonitoringState {
                    status: ExecutionStatus::Stopped,
                    monitoring_started_at: None,
                    monitoring_stopped_at: None,
                },
            },
        );
    }

    async fn mark_monitoring_started(&self, id: WorkflowId) {
        if let Some(mut stored) = self.workflows.get_mut(&id) {
            stored.monitoring.status = ExecutionStatus::Pending;
            stored.monitoring.monitoring_started_at = Some(Utc::now());
        }
    }

    async fn mark_monitoring_stopped(&self, id: WorkflowId) {
        if let Some(mut stored) = self.workflows.get_mut(&id) {
            stored.monitoring.status = ExecutionStatus::Stopped;
            stored.monitoring.monitoring_stopped_at = Some(Utc::now());
        }
    }

    async fn monitoring_state(&self, id: WorkflowId) -> Option<MonitoringState> {
        self.workflows.get(&id).map(|w| w.monitoring.clone())
    }
}

/// In-memory execution store.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: DashMap<ExecutionId, ExecutionRecord>,
}

impl InMemoryExecutionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executions.len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn insert(&self, record: ExecutionRecord) {
        self.executions.insert(record.execution_id, record);
    }

    async fn update(&self, record: ExecutionRecord) {
        self.executions.insert(record.execution_id, record);
    }

    async fn get(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.executions.get(&id).map(|r| r.clone())
    }

    async fn count_running(&self, workflow_id: WorkflowId) -> usize {
        self.executions
            .iter()
            .filter(|r| r.workflow_id == workflow_id && r.status == ExecutionStatus::Running)
            .count()
    }
}
