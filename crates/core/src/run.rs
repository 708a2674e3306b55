// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A workflow `Run`: one execution of a `WorkflowDef`'s DAG, plus the
//! per-node state that the engine checkpoints as it advances.

use crate::workflow::{NodeId, RunInputs, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Identifies a single [`Run`].
    pub struct RunId;
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    /// The daemon restarted while this run was in flight and the run was
    /// not marked `idempotent`, so it could not be safely resumed.
    Abandoned,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Status of a single node's execution within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// The materialized state of one node inside a [`Run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub attempts: u32,
    pub outputs: serde_json::Value,
    pub error: Option<String>,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
}

impl NodeState {
    pub fn pending(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: NodeStatus::Pending,
            attempts: 0,
            outputs: serde_json::Value::Null,
            error: None,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

/// A single execution of a workflow's DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub workflow_version: u32,
    pub status: RunStatus,
    pub inputs: RunInputs,
    pub nodes: HashMap<String, NodeState>,
    pub started_at_ms: i64,
    pub finished_at_ms: Option<i64>,
    /// Set when `status` is `Cancelled`; distinguishes operator cancellation
    /// from a node failure.
    pub cancel_requested: bool,
}

impl Run {
    pub fn new(id: RunId, workflow_id: WorkflowId, workflow_version: u32, inputs: RunInputs, started_at_ms: i64) -> Self {
        Self {
            id,
            workflow_id,
            workflow_version,
            status: RunStatus::Running,
            inputs,
            nodes: HashMap::new(),
            started_at_ms,
            finished_at_ms: None,
            cancel_requested: false,
        }
    }

    pub fn node_state(&self, node_id: &NodeId) -> Option<&NodeState> {
        self.nodes.get(node_id.as_str())
    }

    pub fn all_nodes_terminal(&self) -> bool {
        self.nodes.values().all(|n| {
            matches!(
                n.status,
                NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped
            )
        })
    }

    pub fn any_node_failed(&self) -> bool {
        self.nodes.values().any(|n| n.status == NodeStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_with_no_terminal_nodes() {
        let run = Run::new(
            RunId::new("run-1"),
            WorkflowId::new("wf-1"),
            1,
            RunInputs::new(),
            0,
        );
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.nodes.is_empty());
        assert!(run.all_nodes_terminal());
    }

    #[test]
    fn all_nodes_terminal_false_while_running() {
        let mut run = Run::new(
            RunId::new("run-2"),
            WorkflowId::new("wf-1"),
            1,
            RunInputs::new(),
            0,
        );
        let node_id = NodeId::new("a");
        let mut state = NodeState::pending(node_id.clone());
        state.status = NodeStatus::Running;
        run.nodes.insert(node_id.as_str().to_string(), state);
        assert!(!run.all_nodes_terminal());
    }
}
