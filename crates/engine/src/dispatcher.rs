// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG-aware workflow dispatcher.
//!
//! Drives a single [`Run`] to completion against its [`WorkflowDef`]:
//! nodes become ready once every upstream edge is satisfied, up to
//! `max_parallel_nodes_per_run` run concurrently, and a failed node without
//! `continue_on_error` skips everything downstream of it rather than
//! failing the whole run outright — siblings on other branches still run
//! to completion.

use crate::backoff::RetryClock;
use relay_core::{NodeDef, NodeId, NodeStatus, RelayError, Run, RunStatus, WorkflowDef};
use relay_exec::{NodeInputs, NodeOutputs, ProcessorRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct Engine {
    processors: Arc<ProcessorRegistry>,
}

impl Engine {
    pub fn new(processors: ProcessorRegistry) -> Self {
        Self {
            processors: Arc::new(processors),
        }
    }

    /// Drive `run` to completion with no external cancellation source; the
    /// run can still self-cancel via `run.cancel_requested`.
    pub async fn run(&self, workflow: &WorkflowDef, run: &mut Run) -> Result<(), RelayError> {
        self.run_cancellable(workflow, run, None).await
    }

    /// Drive `run` to completion, additionally polling `cancel` (set by an
    /// operator-initiated cancel request racing this execution) at the top
    /// of every scheduling loop iteration.
    pub async fn run_cancellable(
        &self,
        workflow: &WorkflowDef,
        run: &mut Run,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), RelayError> {
        for node in &workflow.nodes {
            run.nodes
                .entry(node.id.as_str().to_string())
                .or_insert_with(|| relay_core::NodeState::pending(node.id.clone()));
        }

        let max_parallel = workflow.max_parallel_nodes_per_run.unwrap_or(u32::MAX).max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut retry_clock = RetryClock::new();

        loop {
            if run.cancel_requested || cancel.map(CancellationToken::is_cancelled).unwrap_or(false) {
                run.status = RunStatus::Cancelled;
                break;
            }

            propagate_skips(workflow, run);

            if run.all_nodes_terminal() {
                run.status = if run.any_node_failed() {
                    RunStatus::Failed
                } else {
                    RunStatus::Completed
                };
                break;
            }

            let now = Instant::now();
            let ready = ready_nodes(workflow, run, &retry_clock, now);

            if ready.is_empty() {
                match retry_clock.next_deadline() {
                    Some(deadline) => tokio::time::sleep(deadline.saturating_duration_since(now)).await,
                    None => {
                        warn!(run_id = run.id.short(8), "no node ready and no retry pending; abandoning run");
                        run.status = RunStatus::Abandoned;
                        break;
                    }
                }
                continue;
            }

            let mut handles = Vec::with_capacity(ready.len());
            for node_id in ready {
                if let Some(state) = run.nodes.get_mut(node_id.as_str()) {
                    state.status = NodeStatus::Running;
                    state.started_at_ms.get_or_insert_with(|| unix_ms());
                }

                let inputs = match collect_inputs(workflow, run, &node_id) {
                    Ok(inputs) => inputs,
                    Err(e) => {
                        // A missing required input is a static DAG/trigger-payload
                        // problem, not a flaky execution — retrying would just
                        // reproduce it, so fail the node immediately.
                        if let Some(state) = run.nodes.get_mut(node_id.as_str()) {
                            state.status = NodeStatus::Failed;
                            state.error = Some(e.to_string());
                            state.finished_at_ms = Some(unix_ms());
                        }
                        retry_clock.clear(node_id.as_str());
                        continue;
                    }
                };
                let node = workflow.get_node(&node_id).expect("ready node exists in workflow").clone();
                let processors = self.processors.clone();
                let permit = semaphore.clone().acquire_owned().await.map_err(|e| RelayError::Internal(e.to_string()))?;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let result = execute_with_timeout(&processors, &node, &inputs).await;
                    (node_id, result)
                }));
            }

            for handle in handles {
                let (node_id, result) = handle.await.map_err(|e| RelayError::Internal(e.to_string()))?;
                apply_result(workflow, run, &node_id, result, &mut retry_clock);
            }
        }

        run.finished_at_ms = Some(unix_ms());
        Ok(())
    }
}

fn ready_nodes(workflow: &WorkflowDef, run: &Run, retry_clock: &RetryClock, now: Instant) -> Vec<NodeId> {
    workflow
        .nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| {
            run.node_state(id).map(|s| s.status) == Some(NodeStatus::Pending)
                && retry_clock.is_ready(id.as_str(), now)
                && predecessors_satisfied(workflow, run, id)
        })
        .cloned()
        .collect()
}

fn predecessors_satisfied(workflow: &WorkflowDef, run: &Run, node: &NodeId) -> bool {
    workflow.edges_into(node).iter().all(|edge| {
        matches!(
            run.node_state(&edge.from_node).map(|s| s.status),
            Some(NodeStatus::Succeeded) | Some(NodeStatus::Skipped)
        )
    })
}

/// Mark as [`NodeStatus::Skipped`] any pending node downstream of a failed,
/// non-`continue_on_error` predecessor.
fn propagate_skips(workflow: &WorkflowDef, run: &mut Run) {
    loop {
        let to_skip: Vec<NodeId> = workflow
            .nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| run.node_state(id).map(|s| s.status) == Some(NodeStatus::Pending))
            .filter(|id| {
                workflow.edges_into(id).iter().any(|edge| {
                    let predecessor = workflow.get_node(&edge.from_node);
                    let failed_blocking = run.node_state(&edge.from_node).map(|s| s.status) == Some(NodeStatus::Failed)
                        && !predecessor.map(|n| n.continue_on_error).unwrap_or(false);
                    let skipped = run.node_state(&edge.from_node).map(|s| s.status) == Some(NodeStatus::Skipped);
                    failed_blocking || skipped
                })
            })
            .cloned()
            .collect();

        if to_skip.is_empty() {
            return;
        }
        for id in to_skip {
            if let Some(state) = run.nodes.get_mut(id.as_str()) {
                state.status = NodeStatus::Skipped;
            }
        }
    }
}

/// Resolve a node's declared input ports from its inbound edges.
///
/// A port with no bound edge (or whose producer never wrote that output,
/// e.g. it was skipped) is assigned `null` if the port is declared
/// optional; otherwise the node fails immediately with `missing_input`.
fn collect_inputs(workflow: &WorkflowDef, run: &Run, node_id: &NodeId) -> Result<NodeInputs, RelayError> {
    let node = workflow.get_node(node_id).expect("ready node exists in workflow");
    let mut inputs = NodeInputs::new();
    for port in &node.inputs {
        let value = workflow.edges_into(node_id).into_iter().find(|e| &e.to_port == port).and_then(|edge| {
            run.node_state(&edge.from_node)
                .and_then(|state| state.outputs.get(&edge.from_port))
                .cloned()
        });
        match value {
            Some(value) => {
                inputs.insert(port.clone(), value);
            }
            None if node.optional_inputs.iter().any(|p| p == port) => {
                inputs.insert(port.clone(), serde_json::Value::Null);
            }
            None => {
                return Err(RelayError::MissingInput {
                    node: node_id.as_str().to_string(),
                    port: port.clone(),
                })
            }
        }
    }
    Ok(inputs)
}

fn outputs_to_value(outputs: NodeOutputs) -> serde_json::Value {
    serde_json::Value::Object(outputs.into_iter().collect())
}

async fn execute_with_timeout(
    processors: &ProcessorRegistry,
    node: &NodeDef,
    inputs: &NodeInputs,
) -> Result<NodeOutputs, RelayError> {
    match node.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), processors.execute(node, inputs))
            .await
            .unwrap_or_else(|_| Err(RelayError::Unavailable(format!("node `{}` timed out after {secs}s", node.id.as_str())))),
        None => processors.execute(node, inputs).await,
    }
}

fn apply_result(
    workflow: &WorkflowDef,
    run: &mut Run,
    node_id: &NodeId,
    result: Result<NodeOutputs, RelayError>,
    retry_clock: &mut RetryClock,
) {
    let max_retries = workflow.get_node(node_id).map(|n| n.max_retries).unwrap_or(0);
    let Some(state) = run.nodes.get_mut(node_id.as_str()) else {
        return;
    };

    match result {
        Ok(outputs) => {
            state.status = NodeStatus::Succeeded;
            state.outputs = outputs_to_value(outputs);
            state.error = None;
            state.finished_at_ms = Some(unix_ms());
            retry_clock.clear(node_id.as_str());
        }
        Err(e) => {
            state.attempts += 1;
            state.error = Some(e.to_string());
            if state.attempts <= max_retries {
                state.status = NodeStatus::Pending;
                retry_clock.schedule(node_id.as_str(), state.attempts, Instant::now());
            } else {
                state.status = NodeStatus::Failed;
                state.finished_at_ms = Some(unix_ms());
                retry_clock.clear(node_id.as_str());
            }
        }
    }
}

fn unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{EdgeDef, RunId, WorkflowId};
    use std::collections::HashMap;

    fn node(id: &str, node_type: &str, inputs: &[&str], outputs: &[&str], max_retries: u32, continue_on_error: bool) -> NodeDef {
        node_with_optional(id, node_type, inputs, &[], outputs, max_retries, continue_on_error)
    }

    fn node_with_optional(
        id: &str,
        node_type: &str,
        inputs: &[&str],
        optional_inputs: &[&str],
        outputs: &[&str],
        max_retries: u32,
        continue_on_error: bool,
    ) -> NodeDef {
        NodeDef {
            id: NodeId::new(id),
            node_type: node_type.into(),
            config: serde_json::Value::Null,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            optional_inputs: optional_inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            timeout_secs: Some(5),
            max_retries,
            continue_on_error,
            idempotent: true,
        }
    }

    struct AlwaysFail;
    #[async_trait]
    impl relay_exec::NodeProcessor for AlwaysFail {
        async fn execute(&self, node: &NodeDef, _inputs: &NodeInputs) -> Result<NodeOutputs, RelayError> {
            Err(RelayError::Internal(format!("{} always fails", node.id.as_str())))
        }
    }

    struct Echo;
    #[async_trait]
    impl relay_exec::NodeProcessor for Echo {
        async fn execute(&self, _node: &NodeDef, inputs: &NodeInputs) -> Result<NodeOutputs, RelayError> {
            let mut out = NodeOutputs::new();
            out.insert("out".into(), inputs.get("in").cloned().unwrap_or(serde_json::Value::Null));
            Ok(out)
        }
    }

    fn workflow(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> WorkflowDef {
        WorkflowDef {
            id: WorkflowId::new("wf"),
            name: "wf".into(),
            version: 1,
            nodes,
            edges,
            max_parallel_nodes_per_run: Some(2),
        }
    }

    #[tokio::test]
    async fn succeeds_through_a_linear_chain() {
        let wf = workflow(
            vec![
                node("a", "echo", &[], &["out"], 0, false),
                node("b", "echo", &["in"], &["out"], 0, false),
            ],
            vec![EdgeDef {
                from_node: NodeId::new("a"),
                from_port: "out".into(),
                to_node: NodeId::new("b"),
                to_port: "in".into(),
            }],
        );
        let mut registry = ProcessorRegistry::new();
        registry.register("echo", Box::new(Echo));
        let engine = Engine::new(registry);

        let mut run = Run::new(RunId::new("r1"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run(&wf, &mut run).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn failed_node_skips_downstream_but_not_siblings() {
        let wf = workflow(
            vec![
                node("fail", "fail", &[], &["out"], 0, false),
                node("downstream", "echo", &["in"], &[], 0, false),
                node("sibling", "echo", &[], &[], 0, false),
            ],
            vec![EdgeDef {
                from_node: NodeId::new("fail"),
                from_port: "out".into(),
                to_node: NodeId::new("downstream"),
                to_port: "in".into(),
            }],
        );
        let mut registry = ProcessorRegistry::new();
        registry.register("fail", Box::new(AlwaysFail));
        registry.register("echo", Box::new(Echo));
        let engine = Engine::new(registry);

        let mut run = Run::new(RunId::new("r2"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run(&wf, &mut run).await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.node_state(&NodeId::new("fail")).unwrap().status, NodeStatus::Failed);
        assert_eq!(run.node_state(&NodeId::new("downstream")).unwrap().status, NodeStatus::Skipped);
        assert_eq!(run.node_state(&NodeId::new("sibling")).unwrap().status, NodeStatus::Succeeded);
    }

    #[tokio::test]
    async fn retries_up_to_max_then_fails() {
        let wf = workflow(vec![node("fail", "fail", &[], &[], 2, false)], vec![]);
        let mut registry = ProcessorRegistry::new();
        registry.register("fail", Box::new(AlwaysFail));
        let engine = Engine::new(registry);

        let mut run = Run::new(RunId::new("r3"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run(&wf, &mut run).await.unwrap();

        let state = run.node_state(&NodeId::new("fail")).unwrap();
        assert_eq!(state.status, NodeStatus::Failed);
        assert_eq!(state.attempts, 3);
    }

    #[tokio::test]
    async fn unbound_required_input_fails_with_missing_input_and_no_retries() {
        let wf = workflow(vec![node("b", "echo", &["in"], &[], 3, false)], vec![]);
        let mut registry = ProcessorRegistry::new();
        registry.register("echo", Box::new(Echo));
        let engine = Engine::new(registry);

        let mut run = Run::new(RunId::new("r4"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run(&wf, &mut run).await.unwrap();

        let state = run.node_state(&NodeId::new("b")).unwrap();
        assert_eq!(state.status, NodeStatus::Failed);
        assert_eq!(state.attempts, 0);
        assert!(state.error.as_ref().unwrap().contains("missing input"));
    }

    #[tokio::test]
    async fn external_cancellation_token_stops_the_run() {
        let wf = workflow(vec![node("a", "echo", &[], &["out"], 0, false)], vec![]);
        let mut registry = ProcessorRegistry::new();
        registry.register("echo", Box::new(Echo));
        let engine = Engine::new(registry);

        let token = CancellationToken::new();
        token.cancel();
        let mut run = Run::new(RunId::new("r6"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run_cancellable(&wf, &mut run, Some(&token)).await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn unbound_optional_input_resolves_to_null() {
        let wf = workflow(
            vec![node_with_optional("b", "echo", &["in"], &["in"], &["out"], 0, false)],
            vec![],
        );
        let mut registry = ProcessorRegistry::new();
        registry.register("echo", Box::new(Echo));
        let engine = Engine::new(registry);

        let mut run = Run::new(RunId::new("r5"), wf.id.clone(), wf.version, HashMap::new(), 0);
        engine.run(&wf, &mut run).await.unwrap();

        let state = run.node_state(&NodeId::new("b")).unwrap();
        assert_eq!(state.status, NodeStatus::Succeeded);
        assert_eq!(state.outputs["out"], serde_json::Value::Null);
    }
}
