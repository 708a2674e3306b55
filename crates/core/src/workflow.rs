// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared workflow DAG data model. Parsing and validation of the on-disk
//! definition language lives in `relay-workflow`; this crate only owns the
//! types that flow through the engine, the store, and the HTTP surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Identifies a [`WorkflowDef`].
    pub struct WorkflowId;
}

crate::define_id! {
    /// Identifies a node within a workflow's DAG.
    pub struct NodeId;
}

crate::define_id! {
    /// Identifies a [`TriggerDef`].
    pub struct TriggerId;
}

/// A single processing step in a workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    /// Dispatch key into the Node Host's processor registry, e.g. `"shell"`.
    pub node_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Subset of `inputs` that may be left unbound: a node with no edge
    /// into one of these ports receives `null` for it instead of failing
    /// with `missing_input`.
    #[serde(default)]
    pub optional_inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub idempotent: bool,
}

/// A directed connection between two nodes' named ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from_node: NodeId,
    pub from_port: String,
    pub to_node: NodeId,
    pub to_port: String,
}

/// A parsed, validated workflow DAG definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub id: WorkflowId,
    pub name: String,
    pub version: u32,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
    pub max_parallel_nodes_per_run: Option<u32>,
}

impl WorkflowDef {
    pub fn get_node(&self, id: &NodeId) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Nodes with no incoming edges; the DAG's entry points.
    pub fn root_nodes(&self) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| !self.edges.iter().any(|e| &e.to_node == *id))
            .collect()
    }

    pub fn edges_into(&self, node: &NodeId) -> Vec<&EdgeDef> {
        self.edges.iter().filter(|e| &e.to_node == node).collect()
    }

    pub fn edges_from(&self, node: &NodeId) -> Vec<&EdgeDef> {
        self.edges.iter().filter(|e| &e.from_node == node).collect()
    }
}

/// A comparison predicate evaluated against an [`crate::Event`]'s fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals { field: String, value: serde_json::Value },
    NumericGt { field: String, value: f64 },
    NumericLt { field: String, value: f64 },
    StringPrefix { field: String, prefix: String },
    Regex { field: String, pattern: String },
}

/// Binds an event-matching predicate to a workflow, so the Trigger Router
/// can dispatch runs without the workflow engine knowing about filesystem
/// events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    pub id: TriggerId,
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub event_kinds: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub enabled: bool,
    #[serde(default)]
    pub disabled_reason: Option<String>,
}

/// Arbitrary key/value inputs supplied when a run is started externally.
pub type RunInputs = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeDef {
        NodeDef {
            id: NodeId::new(id),
            node_type: "shell".into(),
            config: serde_json::Value::Null,
            inputs: vec![],
            optional_inputs: vec![],
            outputs: vec![],
            timeout_secs: None,
            max_retries: 0,
            continue_on_error: false,
            idempotent: false,
        }
    }

    #[test]
    fn root_nodes_excludes_targets_of_edges() {
        let def = WorkflowDef {
            id: WorkflowId::new("wf-1"),
            name: "test".into(),
            version: 1,
            nodes: vec![node("a"), node("b")],
            edges: vec![EdgeDef {
                from_node: NodeId::new("a"),
                from_port: "out".into(),
                to_node: NodeId::new("b"),
                to_port: "in".into(),
            }],
            max_parallel_nodes_per_run: None,
        };
        let roots = def.root_nodes();
        assert_eq!(roots, vec![&NodeId::new("a")]);
    }
}
