//! Shared fixtures for the engine integration tests: a small set of
//! deterministic node implementations and a wired-up orchestrator
//! harness.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use weft_core::WorkflowId;
use weft_engine::{
    ExecutionSettings, ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore,
    Orchestrator, WorkflowStore,
};
use weft_node::{
    Node, NodeDescriptor, NodeError, NodeFactory, NodeInput, NodeOutcome, NodeRegistry, PortMap,
    PortSpec, ResourceClass, TriggerCallback, TriggerNode,
};
use weft_workflow::{NodeCategory, NodeConfig};

/// Factory that hands out the same node instance for every create call.
/// Fixture nodes keep shared state behind `Arc`s, so reuse is fine.
pub struct SingletonFactory {
    descriptor: NodeDescriptor,
    node: Arc<dyn Node>,
}

impl NodeFactory for SingletonFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    fn create(&self, _config: &NodeConfig) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::clone(&self.node))
    }
}

/// Wrap a node instance as a registry factory.
pub fn singleton(node: Arc<dyn Node>) -> Arc<dyn NodeFactory> {
    Arc::new(SingletonFactory {
        descriptor: node.descriptor().clone(),
        node,
    })
}

/// Build a registry from node instances.
pub fn registry_of(nodes: Vec<Arc<dyn Node>>) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for node in nodes {
        registry.register(singleton(node));
    }
    registry
}

/// Emits the configured `value` on its `output` port. Because node
/// config is resolved before execution, a `{"source": "variable"}` value
/// reads from the shared variable namespace.
pub struct ConstNode {
    descriptor: NodeDescriptor,
}

impl ConstNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.const", "Constant", NodeCategory::Input)
                .with_output(PortSpec::universal("output")),
        })
    }
}

#[async_trait]
impl Node for ConstNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let value = input
            .config_value("value")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        Ok(NodeOutcome::single("output", value))
    }
}

/// Integer arithmetic on the `input` port: `op` is `"double"` or
/// `"increment"`.
pub struct MathNode {
    descriptor: NodeDescriptor,
}

impl MathNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.math", "Math", NodeCategory::Processing)
                .with_input(PortSpec::universal("input").required())
                .with_output(PortSpec::universal("output")),
        })
    }
}

#[async_trait]
impl Node for MathNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let value = input
            .port("input")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| NodeError::validation("input must be an integer"))?;
        let result = match input.config_value("op").and_then(serde_json::Value::as_str) {
            Some("double") => value * 2,
            Some("increment") | None => value + 1,
            Some(other) => return Err(NodeError::validation(format!("unknown op: {other}"))),
        };
        Ok(NodeOutcome::single("output", serde_json::json!(result)))
    }
}

/// Boolean decision from the `result` config value (default `true`).
pub struct DecisionNode {
    descriptor: NodeDescriptor,
}

impl DecisionNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.decision", "Decision", NodeCategory::Processing)
                .with_input(PortSpec::universal("input"))
                .with_output(PortSpec::universal("true"))
                .with_output(PortSpec::universal("false")),
        })
    }
}

#[async_trait]
impl Node for DecisionNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let result = input
            .config_value("result")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);
        Ok(NodeOutcome::decision(result, PortMap::new()))
    }
}

/// Fails with a retryable error a fixed number of times, then succeeds.
pub struct FlakyNode {
    descriptor: NodeDescriptor,
    fail_times: u32,
    attempts: AtomicU32,
}

impl FlakyNode {
    pub fn new(fail_times: u32) -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.flaky", "Flaky", NodeCategory::Actions)
                .with_output(PortSpec::universal("output")),
            fail_times,
            attempts: AtomicU32::new(0),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Node for FlakyNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, _input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(NodeError::retryable("transient upstream error"));
        }
        Ok(NodeOutcome::single("output", serde_json::json!("ok")))
    }
}

/// Sleeps for `duration_ms` (config, default 50) and reports it.
pub struct SleepNode {
    descriptor: NodeDescriptor,
}

impl SleepNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.sleep", "Sleep", NodeCategory::Actions)
                .with_output(PortSpec::universal("output")),
        })
    }
}

#[async_trait]
impl Node for SleepNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let duration_ms = input
            .config_value("duration_ms")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(50);
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(duration_ms)) => {}
            () = input.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }
        Ok(NodeOutcome::single("output", serde_json::json!(duration_ms)))
    }
}

/// Always suspends on a human interaction whose id comes from config
/// (default `"I1"`).
pub struct ApprovalNode {
    descriptor: NodeDescriptor,
}

impl ApprovalNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.approval", "Approval", NodeCategory::Actions)
                .with_output(PortSpec::universal("result")),
        })
    }
}

#[async_trait]
impl Node for ApprovalNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let interaction_id = input
            .config_value("interaction_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("I1")
            .to_owned();
        Ok(NodeOutcome::suspend(
            weft_node::InteractionRequest::new(interaction_id, "approval")
                .with_payload("message", serde_json::json!("approve this step?")),
        ))
    }
}

/// Tracks how many instances execute concurrently; used to observe pool
/// caps.
pub struct GaugeNode {
    descriptor: NodeDescriptor,
    current: AtomicUsize,
    max_seen: AtomicUsize,
    hold: Duration,
}

impl GaugeNode {
    pub fn new(node_type: &str, classes: Vec<ResourceClass>, hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new(node_type, "Gauge", NodeCategory::Actions)
                .with_output(PortSpec::universal("output"))
                .with_resources(classes),
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            hold,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Node for GaugeNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, _input: NodeInput) -> Result<NodeOutcome, NodeError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(NodeOutcome::single("output", serde_json::json!(true)))
    }
}

/// Records the order nodes executed in; used for sequential-mode
/// determinism.
pub struct OrderNode {
    descriptor: NodeDescriptor,
    order: parking_lot::Mutex<Vec<weft_core::NodeId>>,
}

impl OrderNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new("test.order", "Order", NodeCategory::Processing)
                .with_output(PortSpec::universal("output")),
            order: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn order(&self) -> Vec<weft_core::NodeId> {
        self.order.lock().clone()
    }
}

#[async_trait]
impl Node for OrderNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError> {
        self.order.lock().push(input.node_id);
        Ok(NodeOutcome::single("output", serde_json::json!(true)))
    }
}

/// A trigger the test fires by hand, like a webhook endpoint would.
pub struct ManualTrigger {
    descriptor: NodeDescriptor,
    state: parking_lot::Mutex<Option<(WorkflowId, TriggerCallback)>>,
}

impl ManualTrigger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: NodeDescriptor::new(
                "test.manual_trigger",
                "Manual Trigger",
                NodeCategory::Triggers,
            )
            .with_output(PortSpec::universal("output")),
            state: parking_lot::Mutex::new(None),
        })
    }

    /// Fire the trigger; the callback runs as its own task, exactly like
    /// a monitoring loop would invoke it.
    pub fn fire(&self, data: serde_json::Value, source: &str) {
        let state = self.state.lock();
        if let Some((workflow_id, callback)) = &*state {
            tokio::spawn((**callback)(*workflow_id, data, source.to_owned()));
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().is_some()
    }
}

#[async_trait]
impl Node for ManualTrigger {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }
    async fn execute(&self, _input: NodeInput) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::single("output", serde_json::json!({"fired": true})))
    }
    fn as_trigger(&self) -> Option<&dyn TriggerNode> {
        Some(self)
    }
}

#[async_trait]
impl TriggerNode for ManualTrigger {
    async fn start_monitoring(
        &self,
        workflow_id: WorkflowId,
        callback: TriggerCallback,
    ) -> Result<(), NodeError> {
        *self.state.lock() = Some((workflow_id, callback));
        Ok(())
    }

    async fn stop_monitoring(&self) -> Result<(), NodeError> {
        *self.state.lock() = None;
        Ok(())
    }
}

/// A wired-up orchestrator over in-memory stores.
pub struct Harness {
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn harness(registry: NodeRegistry) -> Harness {
    harness_with_settings(ExecutionSettings::default(), registry)
}

pub fn harness_with_settings(settings: ExecutionSettings, registry: NodeRegistry) -> Harness {
    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let executions = Arc::new(InMemoryExecutionStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&workflows) as Arc<dyn WorkflowStore>,
        Arc::clone(&executions) as Arc<dyn ExecutionStore>,
        Arc::new(registry),
        settings,
    ));
    Harness {
        workflows,
        executions,
        orchestrator,
    }
}
