// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler: periodically diffs disk state against the durable event
//! store and the downstream index so events missed by the watcher (a
//! channel overflow, a daemon restart, files already present before the
//! first watch) still get picked up.
//!
//! The three ground truths are: disk enumeration (A), the event store's
//! latest completed event per path (B), and the index's known documents
//! (C). A gap between any two is never applied to the index directly —
//! it's turned into a synthetic [`Event`] and appended to the durable
//! store, so it flows through the same trigger router and workflow
//! engine as a watcher-observed change.
//!
//! The vector/search index a real deployment indexes documents into is
//! abstracted behind [`VectorIndex`] so the diff logic can be tested
//! without one.

use async_trait::async_trait;
use relay_core::{DocumentId, DocumentRecord, Event, EventId, EventKind};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A document index the reconciler keeps in sync with disk.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn known_documents(&self) -> Vec<DocumentRecord>;
    async fn upsert(&self, record: &DocumentRecord);
    async fn remove(&self, id: &DocumentId);
}

/// One file observed directly on disk during a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskEntry {
    pub path: PathBuf,
    pub content_hash: String,
    pub size_bytes: u64,
    pub mtime_ms: i64,
}

/// The three-way diff result between disk, the event store, and the index.
///
/// Each field holds what must be synthesized as an [`Event`]; nothing here
/// touches the index directly. See [`synthesize_events`].
#[derive(Debug, Default, PartialEq)]
pub struct ReconcileDiff {
    /// A − B: on disk, no completed event on record yet.
    pub existing: Vec<DiskEntry>,
    /// B − A: a completed event's path is gone from disk.
    pub deleted_paths: Vec<PathBuf>,
    /// C − {A ∪ B}: indexed with no file and no event history.
    pub orphaned: Vec<DocumentRecord>,
    /// Indexed hash disagrees with the current on-disk hash.
    pub modified: Vec<DiskEntry>,
}

impl ReconcileDiff {
    pub fn is_empty(&self) -> bool {
        self.existing.is_empty() && self.deleted_paths.is_empty() && self.orphaned.is_empty() && self.modified.is_empty()
    }
}

/// Compute the three-way diff.
///
/// `on_disk` is ground truth A. `done_by_path` is ground truth B: the
/// latest completed event's content hash per path. `indexed` is ground
/// truth C.
pub fn diff(on_disk: &[DiskEntry], done_by_path: &HashMap<PathBuf, String>, indexed: &[DocumentRecord]) -> ReconcileDiff {
    let disk_paths: HashSet<&Path> = on_disk.iter().map(|e| e.path.as_path()).collect();
    let done_paths: HashSet<&Path> = done_by_path.keys().map(|p| p.as_path()).collect();
    let known: HashSet<&Path> = disk_paths.union(&done_paths).copied().collect();

    let existing = on_disk
        .iter()
        .filter(|e| !done_paths.contains(e.path.as_path()))
        .cloned()
        .collect();

    let modified = on_disk
        .iter()
        .filter(|e| done_by_path.get(&e.path).is_some_and(|hash| hash != &e.content_hash))
        .cloned()
        .collect();

    let deleted_paths = done_by_path
        .keys()
        .filter(|p| !disk_paths.contains(p.as_path()))
        .cloned()
        .collect();

    let orphaned = indexed
        .iter()
        .filter(|d| !known.contains(d.path.as_path()))
        .cloned()
        .collect();

    ReconcileDiff { existing, deleted_paths, orphaned, modified }
}

/// Turn a diff into the events the normal handling path should see.
///
/// Deletes are ordered before creates so that a moved file (observed as a
/// delete-then-create pair) converges to the post-move state within the
/// same pass.
pub fn synthesize_events(diff: &ReconcileDiff, detected_at_ms: i64) -> Vec<Event> {
    let mut events = Vec::new();

    for path in &diff.deleted_paths {
        events.push(Event::new(
            EventId::new(uuid::Uuid::new_v4().to_string()),
            EventKind::Deleted,
            path.clone(),
            detected_at_ms,
        ));
    }
    for doc in &diff.orphaned {
        events.push(Event::new(
            EventId::new(uuid::Uuid::new_v4().to_string()),
            EventKind::Deleted,
            doc.path.clone(),
            detected_at_ms,
        ));
    }
    for entry in &diff.existing {
        events.push(disk_entry_event(entry, EventKind::Existing, detected_at_ms));
    }
    for entry in &diff.modified {
        events.push(disk_entry_event(entry, EventKind::Modified, detected_at_ms));
    }

    events
}

fn disk_entry_event(entry: &DiskEntry, kind: EventKind, detected_at_ms: i64) -> Event {
    let mut event = Event::new(
        EventId::new(uuid::Uuid::new_v4().to_string()),
        kind,
        entry.path.clone(),
        detected_at_ms,
    );
    event.size_bytes = Some(entry.size_bytes);
    event.mtime_ms = Some(entry.mtime_ms);
    event.content_hash = Some(entry.content_hash.clone());
    event
}

/// Apply a diff's `orphaned` removals and re-index `existing`/`modified`
/// entries once the normal handling path has produced up-to-date
/// `DocumentRecord`s for them. The reconciler itself never calls this —
/// it only appends events; a node in the resulting workflow run is what
/// actually indexes a document and calls `upsert`. Kept here for callers
/// (tests, the index's own janitor pass) that want to drop the now-known
/// orphans without waiting on a run.
pub async fn remove_orphans(index: &dyn VectorIndex, diff: &ReconcileDiff) {
    for doc in &diff.orphaned {
        index.remove(&doc.id).await;
    }
}

/// Recursively hash every file under `root` that the watch filter allows.
pub fn scan_disk(root: &Path, filter: &relay_watch::WatchFilter) -> std::io::Result<Vec<DiskEntry>> {
    let mut out = Vec::new();
    scan_dir(root, filter, &mut out)?;
    Ok(out)
}

fn scan_dir(dir: &Path, filter: &relay_watch::WatchFilter, out: &mut Vec<DiskEntry>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            scan_dir(&path, filter, out)?;
            continue;
        }
        if !metadata.is_file() || !filter.allows_path(&path) || !filter.allows_size(metadata.len()) {
            continue;
        }
        let content_hash = hash_file(&path)?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        out.push(DiskEntry {
            path,
            content_hash,
            size_bytes: metadata.len(),
            mtime_ms,
        });
    }
    Ok(())
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}
