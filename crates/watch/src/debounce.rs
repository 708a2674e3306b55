// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path coalescing window: a burst of raw filesystem notifications for
//! the same path collapses into a single change by the time the window
//! expires.

use relay_core::EventKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending {
    kind: EventKind,
    prev_path: Option<PathBuf>,
    last_seen: Instant,
}

/// A coalesced change ready to become an [`relay_core::Event`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoalescedChange {
    pub path: PathBuf,
    pub kind: EventKind,
    pub prev_path: Option<PathBuf>,
}

/// Collapses rapid-fire notifications for the same path into one change,
/// keeping the highest-priority [`EventKind`] seen within the window.
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn record(&mut self, path: PathBuf, kind: EventKind, prev_path: Option<PathBuf>, now: Instant) {
        self.pending
            .entry(path)
            .and_modify(|p| {
                if kind.priority() >= p.kind.priority() {
                    p.kind = kind;
                    if prev_path.is_some() {
                        p.prev_path = prev_path.clone();
                    }
                }
                p.last_seen = now;
            })
            .or_insert(Pending {
                kind,
                prev_path,
                last_seen: now,
            });
    }

    /// Drain every path whose window has elapsed as of `now`.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<CoalescedChange> {
        let expired: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.last_seen) >= self.window)
            .map(|(path, _)| path.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|path| {
                self.pending.remove(&path).map(|p| CoalescedChange {
                    path,
                    kind: p.kind,
                    prev_path: p.prev_path,
                })
            })
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.last_seen + self.window).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
