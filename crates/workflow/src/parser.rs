// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition file parsing (HCL, TOML, and JSON).

use crate::dag::WorkflowDoc;
use crate::validate::{validate_conditions, validate_dag, ValidationError};
use relay_core::{IdGen, TriggerDef, WorkflowDef, WorkflowId};
use thiserror::Error;

/// Workflow definition file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hcl,
    Toml,
    Json,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid workflow definition: {0}")]
    Invalid(String),
    #[error("workflow validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Parse a workflow definition and return the validated DAG plus its
/// triggers. `id_gen` supplies the workflow's identity; callers that already
/// know the id (e.g. reloading a stored definition) can pass a fixed-value
/// generator.
pub fn parse_workflow<G: IdGen>(
    content: &str,
    format: Format,
    id_gen: &G,
) -> Result<(WorkflowDef, Vec<TriggerDef>), ParseError> {
    let doc: WorkflowDoc = match format {
        Format::Hcl => hcl::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };

    let id = WorkflowId::new(id_gen.next());
    let (workflow, triggers) = doc
        .into_def(id)
        .map_err(ParseError::Invalid)?;

    validate_dag(&workflow)?;
    for trigger in &triggers {
        validate_conditions(&trigger.conditions)?;
    }

    Ok((workflow, triggers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::SequentialIdGen;

    const HCL_SOURCE: &str = r#"
        name = "ingest"
        version = 1
        max_parallel_nodes_per_run = 2

        node "fetch" {
          type = "shell"
          outputs = ["out"]
        }

        node "index" {
          type = "http"
          inputs = ["in"]
        }

        edge {
          from = "fetch.out"
          to   = "index.in"
        }

        trigger {
          event_kinds = ["created"]
        }
    "#;

    #[test]
    fn parse_workflow_hcl_roundtrips_dag() {
        let id_gen = SequentialIdGen::new("wf");
        let (workflow, triggers) = parse_workflow(HCL_SOURCE, Format::Hcl, &id_gen).unwrap();
        assert_eq!(workflow.name, "ingest");
        assert_eq!(workflow.nodes.len(), 2);
        assert_eq!(workflow.edges.len(), 1);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].workflow_id, workflow.id);
    }

    #[test]
    fn parse_workflow_rejects_unknown_port() {
        let bad = r#"
            name = "bad"
            node "a" { type = "shell" }
            node "b" { type = "shell" inputs = ["in"] }
            edge { from = "a.out" to = "b.in" }
        "#;
        let id_gen = SequentialIdGen::new("wf");
        assert!(parse_workflow(bad, Format::Hcl, &id_gen).is_err());
    }
}
