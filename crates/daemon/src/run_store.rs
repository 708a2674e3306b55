// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory registry of workflow runs started over HTTP, so the daemon can
//! answer `GET /workflows/{id}/runs/{run_id}` and honor a cancel request
//! that races an in-flight execution.
//!
//! The run's latest known state and its cancellation signal are tracked
//! separately: the snapshot is only as fresh as the last write the owning
//! execution task made (start, then the terminal state), while the
//! [`CancellationToken`] is observed live by the engine's scheduling loop on
//! every iteration, so a cancel request takes effect immediately rather than
//! waiting for the next snapshot write.

use parking_lot::RwLock;
use relay_core::{Run, RunId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct RunHandle {
    snapshot: Run,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct RunStore {
    runs: Arc<RwLock<HashMap<String, RunHandle>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly started run and return the token its execution
    /// task should poll for cancellation.
    pub fn start(&self, run: Run) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.runs.write().insert(
            run.id.as_str().to_string(),
            RunHandle { snapshot: run, cancel: cancel.clone() },
        );
        cancel
    }

    /// Overwrite the stored snapshot once the run reaches a terminal state.
    pub fn finish(&self, run: Run) {
        if let Some(handle) = self.runs.write().get_mut(run.id.as_str()) {
            handle.snapshot = run;
        }
    }

    pub fn get(&self, run_id: &RunId) -> Option<Run> {
        self.runs.read().get(run_id.as_str()).map(|h| h.snapshot.clone())
    }

    /// Signal cancellation for `run_id`. Returns `false` if no run with
    /// that id is registered (never started, or evicted).
    pub fn request_cancel(&self, run_id: &RunId) -> bool {
        match self.runs.read().get(run_id.as_str()) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }
}
