// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw, on-disk shape of a workflow definition file, and its conversion into
//! the shared [`relay_core::WorkflowDef`] graph the engine actually runs.
//!
//! Node blocks accept either a TOML array of tables or an HCL labeled block
//! (`node "fetch" { ... }`); the label (or array-table key) becomes the
//! node's id when the block itself doesn't set one.

use indexmap::IndexMap;
use relay_core::{Condition, EdgeDef, NodeDef, NodeId, TriggerDef, WorkflowDef, WorkflowId};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNodeDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub inputs: Vec<String>,
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

#[derive(Debug, Clone, Deserialize)]
pub struct RawEdgeDef {
    /// `"node_id.port"`
    pub from: String,
    /// `"node_id.port"`
    pub to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTriggerDef {
    #[serde(default)]
    pub event_kinds: Vec<String>,
    #[serde(default, alias = "condition")]
    pub conditions: Vec<Condition>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// The top-level workflow document as parsed from TOML, HCL, or JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDoc {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub max_parallel_nodes_per_run: Option<u32>,
    #[serde(default, alias = "node", deserialize_with = "deserialize_nodes")]
    pub nodes: Vec<RawNodeDef>,
    #[serde(default, alias = "edge")]
    pub edges: Vec<RawEdgeDef>,
    #[serde(default, alias = "trigger")]
    pub triggers: Vec<RawTriggerDef>,
}

fn default_version() -> u32 {
    1
}

/// Deserialize nodes from either a sequence (TOML array of tables) or a map
/// of labeled blocks (HCL `node "name" { ... }`).
fn deserialize_nodes<'de, D>(deserializer: D) -> Result<Vec<RawNodeDef>, D::Error>
where
    D: Deserializer<'de>,
{
    struct NodesVisitor;

    impl<'de> Visitor<'de> for NodesVisitor {
        type Value = Vec<RawNodeDef>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a sequence of nodes or a map of labeled node blocks")
        }

        fn visit_seq<S>(self, seq: S) -> Result<Vec<RawNodeDef>, S::Error>
        where
            S: SeqAccess<'de>,
        {
            Vec::deserialize(de::value::SeqAccessDeserializer::new(seq))
        }

        fn visit_map<M>(self, map: M) -> Result<Vec<RawNodeDef>, M::Error>
        where
            M: MapAccess<'de>,
        {
            let index_map: IndexMap<String, RawNodeDef> =
                IndexMap::deserialize(de::value::MapAccessDeserializer::new(map))?;
            Ok(index_map
                .into_iter()
                .map(|(key, mut node)| {
                    if node.name.is_empty() {
                        node.name = key;
                    }
                    node
                })
                .collect())
        }
    }

    deserializer.deserialize_any(NodesVisitor)
}

/// Split a `"node.port"` reference into its parts.
pub fn split_port_ref(raw: &str) -> Option<(&str, &str)> {
    raw.split_once('.')
}

impl WorkflowDoc {
    /// Build the shared [`WorkflowDef`] and its [`TriggerDef`]s, assigning
    /// `id` from the caller-supplied workflow id and a deterministic trigger
    /// id derived from the workflow id and the trigger's position.
    pub fn into_def(self, id: WorkflowId) -> Result<(WorkflowDef, Vec<TriggerDef>), String> {
        let nodes: Vec<NodeDef> = self
            .nodes
            .iter()
            .map(|raw| NodeDef {
                id: NodeId::new(raw.name.clone()),
                node_type: raw.node_type.clone(),
                config: raw.config.clone(),
                inputs: raw.inputs.clone(),
                optional_inputs: raw.optional_inputs.clone(),
                outputs: raw.outputs.clone(),
                timeout_secs: raw.timeout_secs,
                max_retries: raw.max_retries,
                continue_on_error: raw.continue_on_error,
                idempotent: raw.idempotent,
            })
            .collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        for raw in &self.edges {
            let (from_node, from_port) =
                split_port_ref(&raw.from).ok_or_else(|| format!("edge `from` missing port: {}", raw.from))?;
            let (to_node, to_port) =
                split_port_ref(&raw.to).ok_or_else(|| format!("edge `to` missing port: {}", raw.to))?;
            edges.push(EdgeDef {
                from_node: NodeId::new(from_node),
                from_port: from_port.to_string(),
                to_node: NodeId::new(to_node),
                to_port: to_port.to_string(),
            });
        }

        let workflow = WorkflowDef {
            id: id.clone(),
            name: self.name,
            version: self.version,
            nodes,
            edges,
            max_parallel_nodes_per_run: self.max_parallel_nodes_per_run,
        };

        let triggers = self
            .triggers
            .into_iter()
            .enumerate()
            .map(|(i, raw)| TriggerDef {
                id: relay_core::TriggerId::new(format!("{}-trigger-{i}", id.as_str())),
                workflow_id: id.clone(),
                event_kinds: raw.event_kinds,
                conditions: raw.conditions,
                enabled: raw.enabled,
                disabled_reason: None,
            })
            .collect();

        Ok((workflow, triggers))
    }
}
