// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node Host: the processor registry the workflow engine dispatches a
//! [`NodeDef`] to by its `node_type`.

use crate::subprocess::{run_with_timeout, DEFAULT_SHELL_TIMEOUT};
use async_trait::async_trait;
use relay_core::{NodeDef, RelayError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;

pub type NodeOutputs = HashMap<String, serde_json::Value>;
pub type NodeInputs = HashMap<String, serde_json::Value>;

/// A Node Host backend for one `node_type`.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    async fn execute(&self, node: &NodeDef, inputs: &NodeInputs) -> Result<NodeOutputs, RelayError>;
}

/// Maps `node_type` to the processor that runs it. Unknown types are a
/// validation-time error (see `relay-workflow`'s allowlist), not a runtime
/// one, but the registry still reports `NotFound` defensively.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Box<dyn NodeProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `shell` and `http` processors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("shell", Box::new(ShellProcessor));
        registry.register("http", Box::new(HttpProcessor::default()));
        registry
    }

    pub fn register(&mut self, node_type: impl Into<String>, processor: Box<dyn NodeProcessor>) {
        self.processors.insert(node_type.into(), processor);
    }

    pub async fn execute(&self, node: &NodeDef, inputs: &NodeInputs) -> Result<NodeOutputs, RelayError> {
        let processor = self
            .processors
            .get(&node.node_type)
            .ok_or_else(|| RelayError::NotFound(format!("no processor for node type `{}`", node.node_type)))?;
        processor.execute(node, inputs).await
    }
}

/// Runs `config.command` through the system shell, with inputs interpolated
/// in as `${name}` template variables before the command is handed to
/// `sh -c`.
pub struct ShellProcessor;

#[async_trait]
impl NodeProcessor for ShellProcessor {
    async fn execute(&self, node: &NodeDef, inputs: &NodeInputs) -> Result<NodeOutputs, RelayError> {
        let template = node
            .config
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::InvalidRequest(format!("node `{}` missing `command`", node.id.as_str())))?;

        let vars: HashMap<String, String> = inputs
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();
        let command = relay_workflow::interpolate_shell(template, &vars);

        let timeout = node
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SHELL_TIMEOUT);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command).kill_on_drop(true);

        let output = run_with_timeout(cmd, timeout, &format!("shell node `{}`", node.id.as_str()))
            .await
            .map_err(RelayError::Internal)?;

        let mut outputs = NodeOutputs::new();
        outputs.insert("stdout".into(), String::from_utf8_lossy(&output.stdout).into());
        outputs.insert("stderr".into(), String::from_utf8_lossy(&output.stderr).into());
        outputs.insert("exit_code".into(), output.status.code().unwrap_or(-1).into());

        if output.status.success() {
            Ok(outputs)
        } else {
            Err(RelayError::Internal(format!(
                "shell node `{}` exited with status {:?}",
                node.id.as_str(),
                output.status.code()
            )))
        }
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpolate `${name}` references into every string leaf of a request
/// body, so an http node can forward an upstream node's output inside a
/// JSON payload without the caller having to build the body by hand.
fn interpolate_json(value: &serde_json::Value, vars: &HashMap<String, String>) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(relay_workflow::interpolate(s, vars)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| interpolate_json(v, vars)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), interpolate_json(v, vars))).collect(),
        ),
        other => other.clone(),
    }
}

/// Issues an HTTP request described by `config.method`/`config.url`/
/// `config.body`, returning the response status and body as outputs.
pub struct HttpProcessor {
    client: reqwest::Client,
}

impl Default for HttpProcessor {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NodeProcessor for HttpProcessor {
    async fn execute(&self, node: &NodeDef, inputs: &NodeInputs) -> Result<NodeOutputs, RelayError> {
        let url_template = node
            .config
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::InvalidRequest(format!("node `{}` missing `url`", node.id.as_str())))?;
        let method = node
            .config
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET");

        let vars: HashMap<String, String> = inputs
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();
        let url = relay_workflow::interpolate(url_template, &vars);

        let mut request = self
            .client
            .request(
                method
                    .parse()
                    .map_err(|_| RelayError::InvalidRequest(format!("invalid HTTP method `{method}`")))?,
                url,
            );
        if let Some(body) = node.config.get("body") {
            let body = interpolate_json(body, &vars);
            request = request.json(&body);
        }
        if let Some(timeout_secs) = node.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Unavailable(format!("http node `{}`: {e}", node.id.as_str())))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Internal(format!("reading response body: {e}")))?;

        let mut outputs = NodeOutputs::new();
        outputs.insert("status".into(), status.into());
        outputs.insert("body".into(), body.into());
        Ok(outputs)
    }
}
