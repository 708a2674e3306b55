// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation of a parsed workflow DAG: cycle rejection, port
//! existence, and node type allowlisting.

use regex::Regex;
use relay_core::{Condition, WorkflowDef};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Node types the Node Host ships a processor for. Anything else is a typo,
/// not a future feature — same rationale as the command allowlist this was
/// grounded on.
pub const SUPPORTED_NODE_TYPES: &[&str] = &["shell", "http"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    #[error("unsupported node type `{0}` on node `{1}`")]
    UnsupportedNodeType(String, String),
    #[error("edge references unknown node `{0}`")]
    UnknownNode(String),
    #[error("edge from `{0}.{1}` has no matching output port")]
    UnknownOutputPort(String, String),
    #[error("edge to `{0}.{1}` has no matching input port")]
    UnknownInputPort(String, String),
    #[error("workflow graph contains a cycle")]
    Cycle,
    #[error("invalid regex in trigger condition: {0}")]
    InvalidRegex(String),
}

/// Validate node uniqueness, port references, and acyclicity.
pub fn validate_dag(def: &WorkflowDef) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for node in &def.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNode(node.id.as_str().to_string()));
        }
        if !SUPPORTED_NODE_TYPES.contains(&node.node_type.as_str()) {
            return Err(ValidationError::UnsupportedNodeType(
                node.node_type.clone(),
                node.id.as_str().to_string(),
            ));
        }
    }

    for edge in &def.edges {
        let from = def
            .get_node(&edge.from_node)
            .ok_or_else(|| ValidationError::UnknownNode(edge.from_node.as_str().to_string()))?;
        let to = def
            .get_node(&edge.to_node)
            .ok_or_else(|| ValidationError::UnknownNode(edge.to_node.as_str().to_string()))?;
        if !from.outputs.iter().any(|p| p == &edge.from_port) {
            return Err(ValidationError::UnknownOutputPort(
                from.id.as_str().to_string(),
                edge.from_port.clone(),
            ));
        }
        if !to.inputs.iter().any(|p| p == &edge.to_port) {
            return Err(ValidationError::UnknownInputPort(
                to.id.as_str().to_string(),
                edge.to_port.clone(),
            ));
        }
    }

    reject_cycles(def)
}

/// Kahn's algorithm: a valid DAG must admit a full topological ordering.
fn reject_cycles(def: &WorkflowDef) -> Result<(), ValidationError> {
    let mut in_degree: HashMap<&str, usize> =
        def.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for edge in &def.edges {
        *in_degree.entry(edge.to_node.as_str()).or_insert(0) += 1;
    }

    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| *id)
        .collect();
    queue.sort_unstable();

    let mut visited = 0;
    while let Some(id) = queue.pop() {
        visited += 1;
        for edge in def.edges.iter().filter(|e| e.from_node.as_str() == id) {
            let deg = in_degree.get_mut(edge.to_node.as_str()).expect("target node exists");
            *deg -= 1;
            if *deg == 0 {
                queue.push(edge.to_node.as_str());
            }
        }
    }

    if visited == def.nodes.len() {
        Ok(())
    } else {
        Err(ValidationError::Cycle)
    }
}

/// Verify every `Condition::Regex` pattern actually compiles. Called before
/// a trigger is enabled; a bad pattern disables the trigger rather than
/// failing the whole workflow parse.
pub fn validate_conditions(conditions: &[Condition]) -> Result<(), ValidationError> {
    for condition in conditions {
        if let Condition::Regex { pattern, .. } = condition {
            Regex::new(pattern).map_err(|e| ValidationError::InvalidRegex(e.to_string()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{EdgeDef, NodeDef, NodeId, WorkflowId};

    fn node(id: &str, node_type: &str, inputs: &[&str], outputs: &[&str]) -> NodeDef {
        NodeDef {
            id: NodeId::new(id),
            node_type: node_type.into(),
            config: serde_json::Value::Null,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            optional_inputs: vec![],
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            timeout_secs: None,
            max_retries: 0,
            continue_on_error: false,
            idempotent: false,
        }
    }

    fn edge(from: &str, from_port: &str, to: &str, to_port: &str) -> EdgeDef {
        EdgeDef {
            from_node: NodeId::new(from),
            from_port: from_port.into(),
            to_node: NodeId::new(to),
            to_port: to_port.into(),
        }
    }

    fn def(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> WorkflowDef {
        WorkflowDef {
            id: WorkflowId::new("wf"),
            name: "wf".into(),
            version: 1,
            nodes,
            edges,
            max_parallel_nodes_per_run: None,
        }
    }

    #[test]
    fn accepts_a_valid_linear_dag() {
        let d = def(
            vec![node("a", "shell", &[], &["out"]), node("b", "http", &["in"], &[])],
            vec![edge("a", "out", "b", "in")],
        );
        assert!(validate_dag(&d).is_ok());
    }

    #[test]
    fn rejects_a_cycle() {
        let d = def(
            vec![
                node("a", "shell", &["in"], &["out"]),
                node("b", "shell", &["in"], &["out"]),
            ],
            vec![edge("a", "out", "b", "in"), edge("b", "out", "a", "in")],
        );
        assert_eq!(validate_dag(&d), Err(ValidationError::Cycle));
    }

    #[test]
    fn rejects_unsupported_node_type() {
        let d = def(vec![node("a", "carrier-pigeon", &[], &[])], vec![]);
        assert!(matches!(validate_dag(&d), Err(ValidationError::UnsupportedNodeType(..))));
    }

    #[test]
    fn rejects_edge_to_missing_input_port() {
        let d = def(
            vec![node("a", "shell", &[], &["out"]), node("b", "http", &[], &[])],
            vec![edge("a", "out", "b", "in")],
        );
        assert!(matches!(validate_dag(&d), Err(ValidationError::UnknownInputPort(..))));
    }

    #[test]
    fn validate_conditions_rejects_bad_regex() {
        let bad = vec![Condition::Regex {
            field: "path".into(),
            pattern: "(unterminated".into(),
        }];
        assert!(validate_conditions(&bad).is_err());
    }
}
