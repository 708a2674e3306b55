// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive multi-root filesystem watcher with debounce coalescing.
//!
//! Grounded in the CLI's own `notify::recommended_watcher` + channel-callback
//! idiom used for log tailing, generalized to multiple watch roots, an
//! include/exclude filter, and debounce-window coalescing before changes
//! reach the durable event store.

use crate::debounce::{CoalescedChange, Debouncer};
use crate::filter::WatchFilter;
use notify::{Event as NotifyEvent, EventKind as NotifyEventKind, RecommendedWatcher, RecursiveMode, Watcher};
use relay_core::EventKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// A watch root the daemon is responsible for keeping reconciled.
#[derive(Debug, Clone)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub filter: WatchFilter,
}

/// Folder watcher producing debounced changes on an async channel.
///
/// `notify`'s internal event channel can overflow under a heavy burst of
/// filesystem activity; when that happens this watcher does not try to
/// reconstruct the dropped events — it surfaces an overflow signal so the
/// caller can fall back to a full reconciliation scan, per the Reconciler's
/// contract with the watcher.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
    changes: mpsc::Receiver<WatchMessage>,
}

/// A message emitted by the watcher's background task.
#[derive(Debug, Clone)]
pub enum WatchMessage {
    Change(CoalescedChange),
    Overflow,
}

impl FolderWatcher {
    pub fn start(roots: Vec<WatchRoot>, debounce_window: Duration) -> Result<Self, WatchError> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Result<NotifyEvent, notify::Error>>();

        let mut watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            let _ = raw_tx.send(res);
        })?;

        for root in &roots {
            watcher.watch(&root.path, RecursiveMode::Recursive)?;
        }

        let (out_tx, out_rx) = mpsc::channel(1024);
        let filters: Vec<(PathBuf, WatchFilter)> = roots
            .into_iter()
            .map(|r| (r.path, r.filter))
            .collect();

        tokio::spawn(async move {
            let mut debouncer = Debouncer::new(debounce_window);
            loop {
                let deadline = debouncer
                    .next_deadline()
                    .map(tokio::time::Instant::from_std);
                let sleep = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    maybe_res = raw_rx.recv() => {
                        match maybe_res {
                            Some(Ok(event)) => {
                                handle_notify_event(&event, &filters, &mut debouncer);
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "watcher channel error, requesting reconciliation");
                                if out_tx.send(WatchMessage::Overflow).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                    _ = sleep => {
                        let now = std::time::Instant::now();
                        for change in debouncer.drain_expired(now) {
                            if out_tx.send(WatchMessage::Change(change)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            changes: out_rx,
        })
    }

    pub async fn recv(&mut self) -> Option<WatchMessage> {
        self.changes.recv().await
    }
}

fn handle_notify_event(event: &NotifyEvent, filters: &[(PathBuf, WatchFilter)], debouncer: &mut Debouncer) {
    let kind = match &event.kind {
        NotifyEventKind::Create(_) => EventKind::Created,
        NotifyEventKind::Modify(_) => EventKind::Modified,
        NotifyEventKind::Remove(_) => EventKind::Deleted,
        _ => return,
    };

    let now = std::time::Instant::now();
    for path in &event.paths {
        if !filter_allows(path, filters) {
            continue;
        }
        debouncer.record(path.clone(), kind, None, now);
    }
}

fn filter_allows(path: &Path, filters: &[(PathBuf, WatchFilter)]) -> bool {
    filters
        .iter()
        .find(|(root, _)| path.starts_with(root))
        .map(|(_, filter)| filter.allows_path(path))
        .unwrap_or(true)
}
