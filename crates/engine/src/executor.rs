//! The reactive parallel executor.
//!
//! Scheduling model: one cooperative loop owns the ready set, the
//! dependency counters, and the [`ExecutionContext`]. Node work runs as
//! tokio tasks that read context snapshots and return outcomes as values;
//! every context write happens in this loop's completion path. Resource
//! semaphores are the only coordination primitive nodes contend on.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use weft_core::{ExecutionId, NodeId};
use weft_execution::{
    ExecutionContext, ExecutionMode, ExecutionProgress, ExecutionStatus, NodeRunResult,
    VariableStore,
};
use weft_node::{
    BranchRouting, CredentialResolver, InteractionRequest, Node, NodeError, NodeInput,
    NodeOutcome, NodeRegistry, NodeRunner, PortMap, ResourceClass,
};
use weft_telemetry::{EventBus, ExecutionEvent};
use weft_workflow::{
    Connection, ExecutionGraph, NodeConfig, WorkflowDefinition, build_execution_graph,
};

/// Shared handle to the per-run context.
///
/// The lock is held only for short synchronous sections, never across an
/// await point.
pub type SharedContext = Arc<RwLock<ExecutionContext>>;

/// Concrete per-run executor configuration, merged from global settings
/// and workflow overrides.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Cap on concurrently executing nodes (and size of the standard
    /// pool).
    pub max_concurrent_nodes: usize,
    /// Size of the llm and ai pools.
    pub ai_concurrent_limit: usize,
    /// Per-node timeout when the node declares none.
    pub default_timeout: Duration,
    /// Overall wall-clock budget; expiry cancels the run.
    pub workflow_timeout: Option<Duration>,
    /// Cancel the run on the first node failure.
    pub stop_on_error: bool,
    /// Retry budget per node.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay: Duration,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Ceiling on the computed retry delay.
    pub max_retry_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: 5,
            ai_concurrent_limit: 2,
            default_timeout: Duration::from_secs(300),
            workflow_timeout: None,
            stop_on_error: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

/// Control commands delivered to a running executor.
#[derive(Debug)]
pub enum ExecutorCommand {
    /// Stop dispatching new nodes; in-flight nodes drain.
    Pause,
    /// Resume dispatching.
    Resume,
    /// Request cooperative cancellation.
    Cancel,
    /// Resolve a pending human interaction with the submitted outputs.
    ResolveInteraction {
        /// The interaction being resolved.
        interaction_id: String,
        /// Outputs the suspended node terminates with.
        outputs: PortMap,
    },
}

/// Handle to a running execution, registered in the orchestrator's
/// active-run table.
///
/// Holds no scheduler state of its own — just the context and the command
/// channel — so it stays valid while the run is suspended on a human
/// interaction without occupying a task.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    execution_id: ExecutionId,
    context: SharedContext,
    commands: mpsc::UnboundedSender<ExecutorCommand>,
    cancellation: CancellationToken,
    paused: Arc<AtomicBool>,
}

impl ExecutorHandle {
    /// The run this handle controls.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// The run's context.
    #[must_use]
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Pause dispatching; in-flight nodes continue to completion.
    pub fn pause(&self) {
        let _ = self.commands.send(ExecutorCommand::Pause);
    }

    /// Resume dispatching.
    pub fn resume(&self) {
        let _ = self.commands.send(ExecutorCommand::Resume);
    }

    /// Whether the executor is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolve a pending interaction by id.
    ///
    /// Returns `false` when no pending interaction matches.
    pub fn resolve_interaction(&self, interaction_id: &str, outputs: PortMap) -> bool {
        let matched = self
            .context
            .read()
            .pending_interactions
            .values()
            .any(|i| i.interaction_id == interaction_id);
        if matched {
            let _ = self.commands.send(ExecutorCommand::ResolveInteraction {
                interaction_id: interaction_id.to_owned(),
                outputs,
            });
        }
        matched
    }
}

/// What a node task reports back to the scheduling loop.
struct NodeTaskResult {
    node_id: NodeId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    retry_count: u32,
    outcome: Result<NodeOutcome, String>,
}

/// Mutable scheduling state for one run.
struct RunState {
    graph: ExecutionGraph,
    ready: VecDeque<NodeId>,
    suspended: HashMap<NodeId, InteractionRequest>,
    /// Per node: dependency sources that resolved as blocked (pruned
    /// branch or skipped upstream node).
    blocked_from: HashMap<NodeId, HashSet<NodeId>>,
    in_flight: HashSet<NodeId>,
    variable_names: HashMap<NodeId, String>,
    failure_seen: bool,
    timed_out: bool,
    paused: bool,
}

/// Reactive scheduler for one workflow run.
pub struct ParallelExecutor {
    config: ExecutorConfig,
    registry: Arc<NodeRegistry>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    events: Arc<EventBus>,
    standard_pool: Arc<Semaphore>,
    llm_pool: Arc<Semaphore>,
    ai_pool: Arc<Semaphore>,
    cancellation: CancellationToken,
    paused: Arc<AtomicBool>,
    commands_tx: mpsc::UnboundedSender<ExecutorCommand>,
    commands_rx: Option<mpsc::UnboundedReceiver<ExecutorCommand>>,
}

impl ParallelExecutor {
    /// Create an executor with the given configuration and node registry.
    #[must_use]
    pub fn new(config: ExecutorConfig, registry: Arc<NodeRegistry>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            standard_pool: Arc::new(Semaphore::new(config.max_concurrent_nodes.max(1))),
            llm_pool: Arc::new(Semaphore::new(config.ai_concurrent_limit.max(1))),
            ai_pool: Arc::new(Semaphore::new(config.ai_concurrent_limit.max(1))),
            config,
            registry,
            credentials: None,
            events: Arc::new(EventBus::default()),
            cancellation: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
            commands_tx,
            commands_rx: Some(commands_rx),
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

    /// The executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Available permits in the standard pool.
    #[must_use]
    pub fn standard_permits(&self) -> usize {
        self.standard_pool.available_permits()
    }

    /// Available permits in the llm pool.
    #[must_use]
    pub fn llm_permits(&self) -> usize {
        self.llm_pool.available_permits()
    }

    /// Available permits in the ai pool.
    #[must_use]
    pub fn ai_permits(&self) -> usize {
        self.ai_pool.available_permits()
    }

    /// Whether the executor is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Create a control handle for this run.
    #[must_use]
    pub fn handle(&self, context: SharedContext) -> ExecutorHandle {
        let execution_id = context.read().execution_id;
        ExecutorHandle {
            execution_id,
            context,
            commands: self.commands_tx.clone(),
            cancellation: self.cancellation.clone(),
            paused: Arc::clone(&self.paused),
        }
    }

    /// Run the workflow to a terminal status.
    ///
    /// Seeds the ready set with the graph's source nodes, then reacts to
    /// completions: each settled node resolves its dependents, branch
    /// pruning skips unreachable subgraphs, and human-interaction
    /// suspensions park the run without occupying a task.
    pub async fn run(
        &mut self,
        workflow: Arc<WorkflowDefinition>,
        context: SharedContext,
    ) -> ExecutionStatus {
        let graph = build_execution_graph(&workflow);
        let (mode, execution_id) = {
            let ctx = context.read();
            (ctx.execution_mode, ctx.execution_id)
        };
        let sequential = mode == ExecutionMode::Sequential;
        let dry_run = mode == ExecutionMode::DryRun;
        let effective_max = if sequential {
            1
        } else {
            self.config.max_concurrent_nodes.max(1)
        };

        let mut state = RunState {
            ready: graph.source_nodes.iter().copied().collect(),
            suspended: HashMap::new(),
            blocked_from: HashMap::new(),
            in_flight: HashSet::new(),
            variable_names: build_variable_names(&workflow),
            failure_seen: false,
            timed_out: false,
            paused: false,
            graph,
        };

        {
            let mut ctx = context.write();
            ctx.progress = ExecutionProgress::new(
                state.graph.nodes.len(),
                state.graph.schedulable_count(),
            );
            ctx.start_execution();
            for warning in &state.graph.warnings {
                ctx.log_event("graph_warning", serde_json::json!({ "message": warning }));
            }
        }

        tracing::info!(
            %execution_id,
            workflow_id = %workflow.id,
            nodes = state.graph.nodes.len(),
            sources = state.graph.source_nodes.len(),
            %mode,
            "execution started"
        );

        let mut commands = self
            .commands_rx
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        let mut join_set: JoinSet<NodeTaskResult> = JoinSet::new();
        let deadline = self
            .config
            .workflow_timeout
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            if !state.paused {
                self.dispatch_ready(
                    &mut state,
                    &mut join_set,
                    &workflow,
                    &context,
                    effective_max,
                    dry_run,
                );
            }

            if state.ready.is_empty() && join_set.is_empty() && state.suspended.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                    match joined {
                        Ok(task_result) => {
                            self.handle_task_result(task_result, &mut state, &workflow, &context);
                        }
                        Err(join_err) => {
                            // Aborted or panicked task; the node is settled
                            // during finalization.
                            tracing::error!(%execution_id, error = %join_err, "node task did not complete");
                        }
                    }
                }
                Some(command) = commands.recv() => {
                    self.handle_command(command, &mut state, &workflow, &context);
                }
                () = self.cancellation.cancelled() => break,
                () = tokio::time::sleep_until(
                    deadline.unwrap_or_else(tokio::time::Instant::now)
                ), if deadline.is_some() && !state.timed_out => {
                    state.timed_out = true;
                    tracing::warn!(%execution_id, "workflow timeout expired, cancelling run");
                    context.write().log_event("workflow_timeout", serde_json::json!({}));
                    self.cancellation.cancel();
                }
            }
        }

        join_set.shutdown().await;
        let status = self.finalize(&mut state, &context);
        tracing::info!(%execution_id, %status, "execution finished");
        status
    }

    /// Dispatch as many ready nodes as the budget and semaphores allow.
    fn dispatch_ready(
        &self,
        state: &mut RunState,
        join_set: &mut JoinSet<NodeTaskResult>,
        workflow: &Arc<WorkflowDefinition>,
        context: &SharedContext,
        effective_max: usize,
        dry_run: bool,
    ) {
        let mut deferred: VecDeque<NodeId> = VecDeque::new();

        while join_set.len() < effective_max && !self.cancellation.is_cancelled() {
            let Some(node_id) = state.ready.pop_front() else {
                break;
            };
            let now = Utc::now();

            let Some(node_config) = workflow.node(node_id).cloned() else {
                context.write().progress.node_started();
                self.settle_failure(state, workflow, context, node_id, "node configuration missing", 0, now, now);
                continue;
            };

            if dry_run {
                context.write().progress.node_started();
                let mut outputs = PortMap::new();
                outputs.insert("dry_run".into(), serde_json::Value::Bool(true));
                self.settle_success(state, workflow, context, node_id, None, outputs, 0, now, now);
                continue;
            }

            let node = match self.registry.instantiate(&node_config) {
                Ok(node) => node,
                Err(err) => {
                    context.write().progress.node_started();
                    self.settle_failure(state, workflow, context, node_id, &err.to_string(), 0, now, now);
                    continue;
                }
            };

            let mut classes = node.descriptor().resource_classes.clone();
            classes.sort_unstable();
            classes.dedup();
            let Some(permits) = self.try_acquire_permits(&classes) else {
                deferred.push_back(node_id);
                continue;
            };

            {
                let mut ctx = context.write();
                ctx.progress.node_started();
                ctx.log_event("node_started", serde_json::json!({ "node_id": node_id }));
            }
            state.in_flight.insert(node_id);
            tracing::debug!(%node_id, node_type = %node_config.node_type, "dispatching node");

            let input_connections = state
                .graph
                .node(node_id)
                .map(|entry| entry.input_connections.clone())
                .unwrap_or_default();
            join_set.spawn(self.node_task(
                node,
                node_config,
                input_connections,
                Arc::clone(workflow),
                Arc::clone(context),
                permits,
            ));
        }

        while let Some(node_id) = deferred.pop_back() {
            state.ready.push_front(node_id);
        }
    }

    /// Try to acquire permits from every declared pool, in canonical
    /// order. All-or-nothing: partial acquisitions release on drop.
    fn try_acquire_permits(&self, classes: &[ResourceClass]) -> Option<Vec<OwnedSemaphorePermit>> {
        let mut permits = Vec::with_capacity(classes.len());
        for class in classes {
            let pool = match class {
                ResourceClass::Standard => &self.standard_pool,
                ResourceClass::Llm => &self.llm_pool,
                ResourceClass::Ai => &self.ai_pool,
            };
            match Arc::clone(pool).try_acquire_owned() {
                Ok(permit) => permits.push(permit),
                Err(_) => return None,
            }
        }
        Some(permits)
    }

    /// Build the task future for one node: per-attempt input assembly,
    /// timeout, retry with exponential backoff, cooperative cancellation.
    fn node_task(
        &self,
        node: Arc<dyn Node>,
        node_config: NodeConfig,
        input_connections: Vec<Connection>,
        workflow: Arc<WorkflowDefinition>,
        context: SharedContext,
        permits: Vec<OwnedSemaphorePermit>,
    ) -> impl Future<Output = NodeTaskResult> + Send + use<> {
        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let credentials = self.credentials.clone();
        let cancellation = self.cancellation.clone();

        async move {
            let _permits = permits;
            let node_id = node_config.id;
            let started_at = Utc::now();
            let timeout = node_config.timeout.unwrap_or(config.default_timeout);
            let (execution_id, frontend_origin) = {
                let ctx = context.read();
                (ctx.execution_id, ctx.frontend_origin.clone())
            };
            let runner = sibling_runner(
                Arc::clone(&registry),
                Arc::clone(&workflow),
                Arc::clone(&context),
                credentials.clone(),
                cancellation.clone(),
            );

            let mut retry_count: u32 = 0;
            let outcome = loop {
                // Inputs are re-assembled on every attempt so a retry sees
                // upstream outputs and variables that changed meanwhile.
                let (ports, variables, resolved_config) = {
                    let ctx = context.read();
                    (
                        assemble_inputs(&input_connections, &ctx),
                        ctx.variables.snapshot(),
                        resolve_config(&node_config.config, &ctx.variables),
                    )
                };

                let creds = if node_config.credentials.is_empty() {
                    HashMap::new()
                } else {
                    match &credentials {
                        Some(resolver) => match resolver.resolve(&node_config.credentials).await {
                            Ok(map) => map,
                            Err(err) => break Err(format!("credential resolution failed: {err}")),
                        },
                        None => {
                            break Err("credentials required but no resolver configured".to_owned());
                        }
                    }
                };

                let mut input = NodeInput::new(workflow.id, execution_id, node_id)
                    .with_ports(ports)
                    .with_variables(variables)
                    .with_config(resolved_config)
                    .with_cancellation(cancellation.child_token());
                input.credentials = creds;
                input.node_runner = Some(runner.clone());
                input.frontend_origin = frontend_origin.clone();

                let executed = tokio::select! {
                    res = tokio::time::timeout(timeout, node.execute(input)) => res,
                    () = cancellation.cancelled() => break Err("cancelled".to_owned()),
                };

                match executed {
                    Ok(Ok(outcome)) => break Ok(outcome),
                    Ok(Err(NodeError::Cancelled)) => break Err("cancelled".to_owned()),
                    Ok(Err(err)) if err.is_retryable() && retry_count < config.max_retries => {
                        let delay = backoff_delay(&config, retry_count);
                        tracing::debug!(
                            %node_id,
                            attempt = retry_count + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying node"
                        );
                        retry_count += 1;
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = cancellation.cancelled() => break Err("cancelled".to_owned()),
                        }
                    }
                    Ok(Err(err)) => break Err(err.to_string()),
                    Err(_elapsed) if retry_count < config.max_retries => {
                        let delay = backoff_delay(&config, retry_count);
                        tracing::debug!(
                            %node_id,
                            attempt = retry_count + 1,
                            "node timed out, retrying"
                        );
                        retry_count += 1;
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = cancellation.cancelled() => break Err("cancelled".to_owned()),
                        }
                    }
                    Err(_elapsed) => break Err("timeout".to_owned()),
                }
            };

            NodeTaskResult {
                node_id,
                started_at,
                completed_at: Utc::now(),
                retry_count,
                outcome,
            }
        }
    }

    /// Apply one finished node task to the run state.
    fn handle_task_result(
        &self,
        result: NodeTaskResult,
        state: &mut RunState,
        workflow: &Arc<WorkflowDefinition>,
        context: &SharedContext,
    ) {
        state.in_flight.remove(&result.node_id);

        match result.outcome {
            Ok(NodeOutcome::Suspend { interaction }) => {
                let execution_id = {
                    let mut ctx = context.write();
                    ctx.pending_interactions
                        .insert(result.node_id, interaction.clone());
                    ctx.log_event(
                        "node_suspended",
                        serde_json::json!({
                            "node_id": result.node_id,
                            "interaction_id": interaction.interaction_id,
                        }),
                    );
                    ctx.execution_id
                };
                tracing::info!(
                    node_id = %result.node_id,
                    interaction_id = %interaction.interaction_id,
                    "node suspended awaiting interaction"
                );
                self.events.emit(ExecutionEvent::InteractionPending {
                    execution_id,
                    node_id: result.node_id,
                    interaction_id: interaction.interaction_id.clone(),
                });
                state.suspended.insert(result.node_id, interaction);
            }
            Ok(NodeOutcome::Success { outputs }) => {
                self.settle_success(
                    state,
                    workflow,
                    context,
                    result.node_id,
                    None,
                    outputs,
                    result.retry_count,
                    result.started_at,
                    result.completed_at,
                );
            }
            Ok(NodeOutcome::Decision { routing, outputs }) => {
                self.settle_success(
                    state,
                    workflow,
                    context,
                    result.node_id,
                    Some(routing),
                    outputs,
                    result.retry_count,
                    result.started_at,
                    result.completed_at,
                );
            }
            Err(error) => {
                self.settle_failure(
                    state,
                    workflow,
                    context,
                    result.node_id,
                    &error,
                    result.retry_count,
                    result.started_at,
                    result.completed_at,
                );
            }
        }
    }

    /// Record a successful node result and resolve its dependents.
    #[allow(clippy::too_many_arguments)]
    fn settle_success(
        &self,
        state: &mut RunState,
        workflow: &Arc<WorkflowDefinition>,
        context: &SharedContext,
        node_id: NodeId,
        routing: Option<BranchRouting>,
        mut outputs: PortMap,
        retry_count: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) {
        if let Some(routing) = &routing {
            outputs.insert("active_path".into(), serde_json::json!(routing.active_path));
            outputs.insert(
                "active_outputs".into(),
                serde_json::json!(routing.active_outputs),
            );
            outputs.insert(
                "blocked_outputs".into(),
                serde_json::json!(routing.blocked_outputs),
            );
            if routing.active_path == "true" || routing.active_path == "false" {
                outputs.insert(
                    "decision_result".into(),
                    serde_json::json!(routing.active_path == "true"),
                );
            }
        }

        let result = NodeRunResult::succeeded(node_id, outputs.clone())
            .with_timing(started_at, completed_at)
            .with_retries(retry_count);

        let execution_id = {
            let mut ctx = context.write();
            if let Err(err) = ctx.set_node_result(result) {
                tracing::error!(%node_id, error = %err, "discarding duplicate node result");
                return;
            }
            ctx.progress.node_completed();

            if let Some(cfg) = workflow.node(node_id)
                && cfg.share_output_to_variables
            {
                let key = state
                    .variable_names
                    .get(&node_id)
                    .cloned()
                    .unwrap_or_else(|| node_id.to_string());
                ctx.variables.share_node_outputs(key, &outputs);
            }
            ctx.execution_id
        };

        self.events.emit(ExecutionEvent::NodeComplete {
            execution_id,
            node_id,
            success: true,
        });
        self.propagate_resolution(state, context, node_id, routing.as_ref());
    }

    /// Record a failed node result; cancel or resolve dependents per
    /// `stop_on_error`.
    #[allow(clippy::too_many_arguments)]
    fn settle_failure(
        &self,
        state: &mut RunState,
        _workflow: &Arc<WorkflowDefinition>,
        context: &SharedContext,
        node_id: NodeId,
        error: &str,
        retry_count: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) {
        let result = NodeRunResult::failed(node_id, error)
            .with_timing(started_at, completed_at)
            .with_retries(retry_count);

        let execution_id = {
            let mut ctx = context.write();
            if let Err(err) = ctx.set_node_result(result) {
                tracing::error!(%node_id, error = %err, "discarding duplicate node result");
                return;
            }
            ctx.progress.node_failed();
            ctx.execution_id
        };

        tracing::warn!(%node_id, error, retry_count, "node failed");
        self.events.emit(ExecutionEvent::NodeComplete {
            execution_id,
            node_id,
            success: false,
        });

        if self.config.stop_on_error {
            // A failure that is itself the echo of a cancellation must not
            // turn a cancelled run into a failed one.
            if !self.cancellation.is_cancelled() {
                state.failure_seen = true;
                self.cancellation.cancel();
            }
        } else {
            self.propagate_resolution(state, context, node_id, None);
        }
    }

    /// Resolve the dependents of a settled node: decrement counters on
    /// live edges, prune blocked ones.
    fn propagate_resolution(
        &self,
        state: &mut RunState,
        context: &SharedContext,
        node_id: NodeId,
        routing: Option<&BranchRouting>,
    ) {
        let dependents: Vec<NodeId> = state
            .graph
            .node(node_id)
            .map(|entry| entry.dependents.iter().copied().collect())
            .unwrap_or_default();

        for dependent in dependents {
            // Capability-only providers are never scheduled, whatever
            // feeds them.
            if state.graph.capability_only_nodes.contains(&dependent) {
                continue;
            }
            let blocked =
                routing.is_some_and(|r| edges_blocked(&state.graph, node_id, dependent, r));
            if blocked {
                self.resolve_blocked(state, context, node_id, dependent);
            } else {
                let blocked_count = state.blocked_from.get(&dependent).map_or(0, HashSet::len);
                if let Some(entry) = state.graph.node_mut(dependent) {
                    entry.remaining_deps = entry.remaining_deps.saturating_sub(1);
                    if entry.remaining_deps == blocked_count {
                        state.ready.push_back(dependent);
                    }
                }
            }
        }
    }

    /// Record that `node`'s dependency on `from` resolved as blocked, and
    /// sweep forward: a node whose every dependency is blocked (or comes
    /// from a skipped node) is itself skipped, transitively. A node with
    /// any live dependency is left for future completions to decide.
    fn resolve_blocked(
        &self,
        state: &mut RunState,
        context: &SharedContext,
        from: NodeId,
        node: NodeId,
    ) {
        let mut stack = vec![(from, node)];

        while let Some((from, node)) = stack.pop() {
            if state.graph.capability_only_nodes.contains(&node)
                || context.read().node_results.contains_key(&node)
            {
                continue;
            }

            let Some((original, remaining)) = state
                .graph
                .node(node)
                .map(|e| (e.original_dep_count, e.remaining_deps))
            else {
                continue;
            };

            let blocked_set = state.blocked_from.entry(node).or_default();
            if !blocked_set.insert(from) {
                continue;
            }
            let blocked_count = blocked_set.len();

            if blocked_count == original {
                // Every incoming edge is pruned: skip, and prune onward.
                {
                    let mut ctx = context.write();
                    if ctx
                        .set_node_result(NodeRunResult::skipped(node, "branch not taken"))
                        .is_err()
                    {
                        continue;
                    }
                    ctx.progress.nodes_skipped(1);
                    ctx.log_event(
                        "node_skipped",
                        serde_json::json!({ "node_id": node, "reason": "branch not taken" }),
                    );
                }
                tracing::debug!(node_id = %node, "node skipped by branch pruning");
                let dependents: Vec<NodeId> = state
                    .graph
                    .node(node)
                    .map(|entry| entry.dependents.iter().copied().collect())
                    .unwrap_or_default();
                for dependent in dependents {
                    stack.push((node, dependent));
                }
            } else if remaining == blocked_count {
                // All dependencies resolved, at least one of them live.
                state.ready.push_back(node);
            }
        }
    }

    /// Apply a control command.
    fn handle_command(
        &self,
        command: ExecutorCommand,
        state: &mut RunState,
        workflow: &Arc<WorkflowDefinition>,
        context: &SharedContext,
    ) {
        match command {
            ExecutorCommand::Pause => {
                if !state.paused {
                    state.paused = true;
                    self.paused.store(true, Ordering::SeqCst);
                    context
                        .write()
                        .log_event("execution_paused", serde_json::json!({}));
                    tracing::info!("execution paused");
                }
            }
            ExecutorCommand::Resume => {
                if state.paused {
                    state.paused = false;
                    self.paused.store(false, Ordering::SeqCst);
                    context
                        .write()
                        .log_event("execution_resumed", serde_json::json!({}));
                    tracing::info!("execution resumed");
                }
            }
            ExecutorCommand::Cancel => {
                self.cancellation.cancel();
            }
            ExecutorCommand::ResolveInteraction {
                interaction_id,
                outputs,
            } => {
                let Some(node_id) = state
                    .suspended
                    .iter()
                    .find(|(_, i)| i.interaction_id == interaction_id)
                    .map(|(id, _)| *id)
                else {
                    tracing::warn!(%interaction_id, "no suspended node matches interaction");
                    return;
                };
                state.suspended.remove(&node_id);
                {
                    let mut ctx = context.write();
                    ctx.pending_interactions.remove(&node_id);
                    ctx.log_event(
                        "interaction_resolved",
                        serde_json::json!({
                            "node_id": node_id,
                            "interaction_id": interaction_id,
                        }),
                    );
                }
                let now = Utc::now();
                self.settle_success(state, workflow, context, node_id, None, outputs, 0, now, now);
            }
        }
    }

    /// Settle everything left over and pick the terminal status.
    fn finalize(&self, state: &mut RunState, context: &SharedContext) -> ExecutionStatus {
        let cancelled = self.cancellation.is_cancelled();
        let mut ctx = context.write();

        if cancelled {
            for node_id in state.in_flight.drain() {
                if ctx.node_results.contains_key(&node_id) {
                    continue;
                }
                let _ = ctx.set_node_result(NodeRunResult::failed(node_id, "cancelled"));
                ctx.progress.node_failed();
            }
            for (node_id, interaction) in state.suspended.drain() {
                ctx.pending_interactions.remove(&node_id);
                ctx.log_event(
                    "interaction_cancelled",
                    serde_json::json!({
                        "node_id": node_id,
                        "interaction_id": interaction.interaction_id,
                    }),
                );
                if !ctx.node_results.contains_key(&node_id) {
                    let _ = ctx.set_node_result(NodeRunResult::failed(node_id, "cancelled"));
                    ctx.progress.node_failed();
                }
            }
        }

        let unresolved: Vec<NodeId> = state
            .graph
            .nodes
            .keys()
            .copied()
            .filter(|id| !state.graph.capability_only_nodes.contains(id))
            .filter(|id| !ctx.node_results.contains_key(id))
            .collect();
        if !unresolved.is_empty() {
            let reason = if cancelled { "cancelled" } else { "unreachable" };
            for node_id in &unresolved {
                let _ = ctx.set_node_result(NodeRunResult::skipped(*node_id, reason));
            }
            ctx.progress.nodes_skipped(unresolved.len());
            ctx.log_event(
                "nodes_skipped",
                serde_json::json!({ "count": unresolved.len(), "reason": reason }),
            );
        }

        for node_id in &state.graph.sink_nodes {
            if let Some(outputs) = ctx.node_outputs.get(node_id).cloned() {
                ctx.final_outputs
                    .insert(node_id.to_string(), serde_json::Value::Object(outputs));
            }
        }

        ctx.complete_execution();

        let node_failures = ctx
            .node_results
            .values()
            .any(|r| !r.success && !r.skipped);

        if state.timed_out || state.failure_seen {
            ExecutionStatus::Failed
        } else if cancelled {
            ExecutionStatus::Cancelled
        } else if node_failures {
            ExecutionStatus::CompletedWithErrors
        } else {
            ExecutionStatus::Completed
        }
    }
}

/// Assemble a node's input ports from its incoming connections.
///
/// Sources without outputs (capability-only providers, nodes that have
/// not run) are skipped. A missing source port on a single-port output is
/// read as that single value. Multiple connections into the same target
/// port produce a list in connection order.
pub(crate) fn assemble_inputs(
    connections: &[Connection],
    context: &ExecutionContext,
) -> PortMap {
    let mut gathered: Vec<(String, serde_json::Value)> = Vec::new();
    for conn in connections {
        let Some(outputs) = context.node_outputs.get(&conn.source_node_id) else {
            continue;
        };
        let value = outputs.get(&conn.source_port).cloned().or_else(|| {
            if outputs.len() == 1 {
                outputs.values().next().cloned()
            } else {
                None
            }
        });
        let Some(value) = value else { continue };
        gathered.push((conn.target_port.clone(), value));
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (port, _) in &gathered {
        *counts.entry(port.as_str()).or_insert(0) += 1;
    }

    let mut result = PortMap::new();
    for (port, value) in &gathered {
        if counts[port.as_str()] > 1 {
            match result
                .entry(port.clone())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()))
            {
                serde_json::Value::Array(list) => list.push(value.clone()),
                _ => unreachable!("fan-in port initialised as array"),
            }
        } else {
            result.insert(port.clone(), value.clone());
        }
    }
    result
}

/// Resolve node configuration values against the variable store.
///
/// `{"source": "variable", "variable_path": …}` values are replaced with
/// the referenced variable (or `null` when unset). Template values and
/// literals pass through untouched — template rendering is a node-local
/// concern.
pub(crate) fn resolve_config(
    config: &serde_json::Map<String, serde_json::Value>,
    variables: &VariableStore,
) -> serde_json::Map<String, serde_json::Value> {
    let mut resolved = serde_json::Map::new();
    for (key, value) in config {
        let out = match value.as_object() {
            Some(obj)
                if obj.get("source").and_then(serde_json::Value::as_str) == Some("variable") =>
            {
                obj.get("variable_path")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|path| variables.resolve_path(path).cloned())
                    .unwrap_or(serde_json::Value::Null)
            }
            _ => value.clone(),
        };
        resolved.insert(key.clone(), out);
    }
    resolved
}

/// Compute stable, non-colliding variable keys for sharing nodes.
///
/// Preference order: the node's `variable_name` when unique, its id,
/// then the id with a numeric suffix.
pub(crate) fn build_variable_names(workflow: &WorkflowDefinition) -> HashMap<NodeId, String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut mapping = HashMap::new();
    for node in &workflow.nodes {
        if !node.share_output_to_variables {
            continue;
        }
        let mut key = match &node.variable_name {
            Some(name) if !used.contains(name) => name.clone(),
            _ => node.id.to_string(),
        };
        if used.contains(&key) {
            let mut n = 2;
            while used.contains(&format!("{key}_{n}")) {
                n += 1;
            }
            key = format!("{key}_{n}");
        }
        used.insert(key.clone());
        mapping.insert(node.id, key);
    }
    mapping
}

/// Retry delay for the given attempt, exponentially backed off and
/// capped.
pub(crate) fn backoff_delay(config: &ExecutorConfig, retry_count: u32) -> Duration {
    let factor = config.backoff_multiplier.max(1.0).powi(retry_count as i32);
    config
        .retry_delay
        .mul_f64(factor)
        .min(config.max_retry_delay)
}

/// Whether every live edge from `src` to `dst` is on a blocked branch.
///
/// Capability edges never block. Returns `false` when no execution edge
/// exists between the pair.
pub(crate) fn edges_blocked(
    graph: &ExecutionGraph,
    src: NodeId,
    dst: NodeId,
    routing: &BranchRouting,
) -> bool {
    let Some(entry) = graph.node(src) else {
        return false;
    };
    let mut any = false;
    for conn in &entry.output_connections {
        if conn.target_node_id != dst || conn.is_capability() {
            continue;
        }
        any = true;
        if !routing.is_blocked(&conn.branch_key()) {
            return false;
        }
    }
    any
}

/// Build the sibling-node runner handed to agent-style nodes.
fn sibling_runner(
    registry: Arc<NodeRegistry>,
    workflow: Arc<WorkflowDefinition>,
    context: SharedContext,
    credentials: Option<Arc<dyn CredentialResolver>>,
    cancellation: CancellationToken,
) -> NodeRunner {
    NodeRunner::new(move |node_id, ports| {
        let registry = Arc::clone(&registry);
        let workflow = Arc::clone(&workflow);
        let context = Arc::clone(&context);
        let credentials = credentials.clone();
        let cancellation = cancellation.clone();
        Box::pin(async move {
            let Some(cfg) = workflow.node(node_id) else {
                return Err(NodeError::fatal(format!("node not found: {node_id}")));
            };
            let node = registry.instantiate(cfg)?;
            let (execution_id, variables, resolved_config, frontend_origin) = {
                let ctx = context.read();
                (
                    ctx.execution_id,
                    ctx.variables.snapshot(),
                    resolve_config(&cfg.config, &ctx.variables),
                    ctx.frontend_origin.clone(),
                )
            };
            let creds = match (&credentials, cfg.credentials.is_empty()) {
                (Some(resolver), false) => resolver.resolve(&cfg.credentials).await?,
                _ => HashMap::new(),
            };

            let mut input = NodeInput::new(workflow.id, execution_id, node_id)
                .with_ports(ports)
                .with_variables(variables)
                .with_config(resolved_config)
                .with_cancellation(cancellation.child_token());
            input.credentials = creds;
            input.frontend_origin = frontend_origin;

            match node.execute(input).await? {
                NodeOutcome::Success { outputs } | NodeOutcome::Decision { outputs, .. } => {
                    Ok(outputs)
                }
                NodeOutcome::Suspend { .. } => {
                    Err(NodeError::fatal("nested node execution cannot suspend"))
                }
            }
        })
    })
}
