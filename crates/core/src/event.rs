// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The filesystem change event that flows from the watcher through the
//! durable event store to the trigger router.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Identifies an [`Event`] in the durable event store.
    pub struct EventId;
}

/// The kind of filesystem change a watcher or reconciler observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
    Moved,
    /// Synthesized by the reconciler for files that already existed on disk
    /// before the watcher started and have no prior event history.
    Existing,
}

impl EventKind {
    /// Priority used when claiming events for the same path: higher wins.
    /// `deleted` outranks `moved`, which outranks `modified`, which
    /// outranks `created`/`existing`.
    pub fn priority(self) -> u8 {
        match self {
            EventKind::Deleted => 4,
            EventKind::Moved => 3,
            EventKind::Modified => 2,
            EventKind::Created => 1,
            EventKind::Existing => 0,
        }
    }
}

/// Lifecycle status of an event as it moves through the store.
///
/// `Failed` is the transient per-attempt outcome, not a terminal state: a
/// failed claim returns to `Pending` for retry until `attempts` reaches the
/// store's configured `max_attempts`, at which point it becomes `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
    Abandoned,
}

/// A single observed filesystem change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub path: PathBuf,
    /// Previous path, set only for `moved` events.
    pub prev_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub mtime_ms: Option<i64>,
    /// Hex-encoded SHA-256 of the file contents. Computed lazily by the
    /// reconciler, not eagerly on every watcher tick.
    pub content_hash: Option<String>,
    pub detected_at_ms: i64,
    pub status: EventStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub claimed_by: Option<String>,
    /// Set when `status` is `Claimed`; used by `release_stale` to detect a
    /// crashed handler once `claimed_at_ms + claim_ttl_ms < now`.
    pub claimed_at_ms: Option<i64>,
}

impl Event {
    pub fn new(id: EventId, kind: EventKind, path: PathBuf, detected_at_ms: i64) -> Self {
        Self {
            id,
            kind,
            path,
            prev_path: None,
            size_bytes: None,
            mtime_ms: None,
            content_hash: None,
            detected_at_ms,
            status: EventStatus::Pending,
            attempts: 0,
            last_error: None,
            claimed_by: None,
            claimed_at_ms: None,
        }
    }

    /// `done`/`abandoned` in spec terms: no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Completed | EventStatus::Abandoned)
    }
}
