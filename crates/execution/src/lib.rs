#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Execution
//!
//! Mutable per-run state for the Weft workflow engine.
//!
//! This crate models execution-time record keeping — it does NOT contain
//! the scheduler. It defines:
//!
//! - [`ExecutionStatus`] — run-level state machine with validated
//!   transitions
//! - [`ExecutionMode`] and [`TimeMode`] — how a run schedules and tells
//!   time
//! - [`ExecutionContext`] — the per-run ledger of outputs, results,
//!   variables, pending interactions, errors, and progress
//! - [`ExecutionProgress`] — live node counters with the percentage rule
//! - [`NodeRunResult`] — terminal result of one node (written exactly once
//!   per run)
//! - [`VariableStore`] — split user / node-shared variable namespaces with
//!   the output flattening rule
//! - [`ExecutionRecord`] — the shape persisted at terminal transition

pub mod context;
pub mod error;
pub mod mode;
pub mod progress;
pub mod record;
pub mod result;
pub mod status;
pub mod transition;
pub mod variables;

pub use context::{ExecutionContext, ExecutionFault, LogEvent};
pub use error::ExecutionError;
pub use mode::{ExecutionMode, TimeMode};
pub use progress::ExecutionProgress;
pub use record::ExecutionRecord;
pub use result::NodeRunResult;
pub use status::ExecutionStatus;
pub use variables::VariableStore;
