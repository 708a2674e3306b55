// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every HTTP handler.

use crate::auth::AuthGate;
use crate::log_sink::{LogSink, RetentionPolicy};
use crate::run_store::RunStore;
use relay_core::WorkflowDef;
use relay_engine::Engine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Cloneable handle bundle passed into the `axum` router.
///
/// `_keep_dir` exists only so tests can keep a `TempDir` alive for the
/// lifetime of the state that points into it; production callers never set it.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthGate,
    pub logs: LogSink,
    pub workflows: Arc<HashMap<String, WorkflowDef>>,
    pub engine: Arc<Engine>,
    pub runs: RunStore,
    pub archives_dir: PathBuf,
    pub retention_policy: RetentionPolicy,
    #[allow(dead_code)]
    pub _keep_dir: Arc<dyn std::any::Any + Send + Sync>,
}

impl AppState {
    pub fn new(
        auth: AuthGate,
        logs: LogSink,
        workflows: Arc<HashMap<String, WorkflowDef>>,
        engine: Arc<Engine>,
        archives_dir: PathBuf,
        retention_policy: RetentionPolicy,
    ) -> Self {
        Self {
            auth,
            logs,
            workflows,
            engine,
            runs: RunStore::new(),
            archives_dir,
            retention_policy,
            _keep_dir: Arc::new(()),
        }
    }
}
