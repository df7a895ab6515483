//! Live progress counters for a run.

use serde::{Deserialize, Serialize};

/// Real-time node counters for one execution.
///
/// Tracks scheduling decisions dynamically so the percentage stays honest
/// when branches are pruned: skipped nodes leave the in-scope set instead
/// of counting as unfinished work. After the ready set is initialized,
/// `pending + running + completed + failed + skipped` stays constant and
/// equals the number of schedulable nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    /// Total nodes defined in the workflow, capability-only providers
    /// included.
    pub total_nodes_in_workflow: usize,
    /// Nodes waiting to be dispatched.
    pub pending: usize,
    /// Nodes currently executing (or suspended on an interaction).
    pub running: usize,
    /// Nodes that completed successfully.
    pub completed: usize,
    /// Nodes that failed terminally.
    pub failed: usize,
    /// Nodes skipped by branch pruning or cancellation.
    pub skipped: usize,
}

impl ExecutionProgress {
    /// Initialize counters for a run: every schedulable node starts pending.
    #[must_use]
    pub fn new(total_nodes_in_workflow: usize, schedulable: usize) -> Self {
        Self {
            total_nodes_in_workflow,
            pending: schedulable,
            ..Self::default()
        }
    }

    /// Nodes in scope for this execution (everything except skipped).
    #[must_use]
    pub fn in_scope(&self) -> usize {
        self.completed + self.failed + self.running + self.pending
    }

    /// Progress percentage over in-scope nodes, rounded to one decimal.
    ///
    /// Failed nodes count as finished — they are done, just unsuccessfully.
    /// Returns `0.0` when nothing is in scope.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        let in_scope = self.in_scope();
        if in_scope == 0 {
            return 0.0;
        }
        let finished = (self.completed + self.failed) as f64;
        (finished / in_scope as f64 * 1000.0).round() / 10.0
    }

    /// A node moved from pending to running.
    pub fn node_started(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.running += 1;
    }

    /// A running node completed successfully.
    pub fn node_completed(&mut self) {
        self.running = self.running.saturating_sub(1);
        self.completed += 1;
    }

    /// A running node failed terminally.
    pub fn node_failed(&mut self) {
        self.running = self.running.saturating_sub(1);
        self.failed += 1;
    }

    /// `count` pending nodes were skipped.
    pub fn nodes_skipped(&mut self, count: usize) {
        self.pending = self.pending.saturating_sub(count);
        self.skipped += count;
    }

    /// Snapshot including the derived fields.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "total_nodes_in_workflow": self.total_nodes_in_workflow,
            "pending": self.pending,
            "running": self.running,
            "completed": self.completed,
            "failed": self.failed,
            "skipped": self.skipped,
            "in_scope": self.in_scope(),
            "progress_percentage": self.percentage(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_run_is_all_pending() {
        let progress = ExecutionProgress::new(5, 4);
        assert_eq!(progress.total_nodes_in_workflow, 5);
        assert_eq!(progress.pending, 4);
        assert_eq!(progress.percentage(), 0.0);
    }

    #[test]
    fn empty_scope_is_zero_percent() {
        let progress = ExecutionProgress::new(0, 0);
        assert_eq!(progress.in_scope(), 0);
        assert_eq!(progress.percentage(), 0.0);
    }

    #[test]
    fn lifecycle_keeps_population_constant() {
        let mut progress = ExecutionProgress::new(4, 4);
        progress.node_started();
        progress.node_completed();
        progress.node_started();
        progress.node_failed();
        progress.nodes_skipped(1);

        assert_eq!(progress.pending, 1);
        assert_eq!(progress.running, 0);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.skipped, 1);
        assert_eq!(
            progress.pending
                + progress.running
                + progress.completed
                + progress.failed
                + progress.skipped,
            4
        );
    }

    #[test]
    fn failed_nodes_count_as_finished() {
        let mut progress = ExecutionProgress::new(2, 2);
        progress.node_started();
        progress.node_failed();
        // 1 finished of 2 in scope
        assert_eq!(progress.percentage(), 50.0);
    }

    #[test]
    fn skipped_nodes_shrink_the_scope() {
        let mut progress = ExecutionProgress::new(4, 4);
        progress.node_started();
        progress.node_completed();
        progress.nodes_skipped(2);
        // 1 finished of 2 in scope — skipped nodes are out of scope.
        assert_eq!(progress.in_scope(), 2);
        assert_eq!(progress.percentage(), 50.0);
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        let mut progress = ExecutionProgress::new(3, 3);
        progress.node_started();
        progress.node_completed();
        // 1/3 = 33.333… → 33.3
        assert_eq!(progress.percentage(), 33.3);
    }

    #[test]
    fn snapshot_includes_derived_fields() {
        let mut progress = ExecutionProgress::new(2, 2);
        progress.node_started();
        progress.node_completed();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot["completed"], 1);
        assert_eq!(snapshot["in_scope"], 2);
        assert_eq!(snapshot["progress_percentage"], 50.0);
    }
}
