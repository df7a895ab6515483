#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Engine
//!
//! The execution subsystem of the Weft workflow engine:
//!
//! - [`ParallelExecutor`] — reactive scheduler over the execution graph:
//!   bounded concurrency across resource pools, retry with exponential
//!   backoff, decision-branch pruning, pause/resume, cooperative
//!   cancellation, and human-interaction suspension
//! - [`Orchestrator`] — one-shot run lifecycle: load, merge config, run,
//!   persist, notify; plus the process-wide active-run table behind the
//!   cancel / pause / interaction APIs
//! - [`TriggerManager`] — long-lived trigger monitoring per workflow,
//!   with per-workflow admission control and bounded pending queues
//! - [`WorkflowStore`] / [`ExecutionStore`] — persistence ports with
//!   in-memory implementations for tests and single-process deployments
//! - [`ExecutionSettings`] — global execution settings with environment
//!   overrides, merged with per-workflow overrides into an
//!   [`ExecutorConfig`]
//!
//! Singleton wiring belongs to the process bootstrap: every component
//! here is an explicit object handed its collaborators, never a global.

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod settings;
pub mod storage;
pub mod trigger_manager;

pub use error::EngineError;
pub use executor::{ExecutorConfig, ExecutorHandle, ParallelExecutor, SharedContext};
pub use orchestrator::{ExecutionLauncher, Orchestrator};
pub use settings::ExecutionSettings;
pub use storage::{
    ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore, MonitoringState, WorkflowStore,
};
pub use trigger_manager::{ActivationInfo, TriggerManager};
