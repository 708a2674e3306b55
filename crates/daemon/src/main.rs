// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayd`: watches configured folders, appends file events to the
//! durable event store, fires triggered workflow runs, and serves the
//! Log Sink and maintenance surface over HTTP.

use fs2::FileExt;
use relay_core::{Event, EventId, EventStatus, LogEntry, LogId, LogSource, Run, RunId, UuidIdGen};
use relay_daemon::{AppState, AuthGate, Config, EventBus, LogSink, RetentionPolicy};
use relay_engine::Engine;
use relay_exec::ProcessorRegistry;
use relay_storage::{load_snapshot, Checkpointer, FailOutcome, MaterializedState, Wal};
use relay_watch::{FolderWatcher, WatchMessage, WatchRoot};
use relay_workflow::{parse_workflow, Format};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Run a background task under supervision: if it panics, wait with
/// exponential backoff (capped at 60s) and respawn it by calling `make`
/// again. A clean return (no panic) or a cancelled token stops retrying.
fn spawn_supervised<F, Fut>(token: CancellationToken, label: &'static str, mut make: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = Duration::from_secs(1);
        loop {
            if token.is_cancelled() {
                return;
            }
            let mut handle = tokio::spawn(make());
            tokio::select! {
                _ = token.cancelled() => {
                    handle.abort();
                    return;
                }
                result = &mut handle => match result {
                    Ok(()) => return,
                    Err(e) if e.is_panic() => {
                        tracing::error!(task = label, backoff_secs = backoff.as_secs(), "task panicked, respawning");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(Duration::from_secs(60));
                    }
                    Err(_) => return,
                },
            }
        }
    });
}

fn init_tracing() {
    let filter = relay_daemon::env::log_filter();
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if relay_daemon::env::log_format() == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Acquire the single-instance lock, held for the process lifetime.
fn acquire_lock(path: &std::path::Path) -> std::io::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new().create(true).write(true).open(path)?;
    file.try_lock_exclusive()?;
    Ok(file)
}

fn load_workflows(dir: &std::path::Path) -> Vec<(relay_core::WorkflowDef, Vec<relay_core::TriggerDef>)> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    let id_gen = UuidIdGen;
    for entry in entries.flatten() {
        let path = entry.path();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("hcl") => Format::Hcl,
            Some("toml") => Format::Toml,
            Some("json") => Format::Json,
            _ => continue,
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read workflow file");
                continue;
            }
        };
        match parse_workflow(&content, format, &id_gen) {
            Ok(parsed) => out.push(parsed),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to parse workflow"),
        }
    }
    out
}

fn unix_ms() -> i64 {
    relay_core::Clock::now_ms(&relay_core::SystemClock)
}

/// Record an event's abandonment as a lifecycle log entry, correlated to the
/// project-less daemon log so operators can audit events that exhausted
/// `max_attempts` without ever completing.
fn log_abandoned(logs: &LogSink, event_id: &EventId, reason: &str, now_ms: i64) {
    logs.append(LogEntry {
        id: LogId::new(uuid::Uuid::new_v4().to_string()),
        project: "relayd".into(),
        level: relay_core::LogLevel::Error,
        module: "event_store".into(),
        message: format!("event {} abandoned: {reason}", event_id.as_str()),
        document_id: None,
        file_name: None,
        details: None,
        context: None,
        source: LogSource::Lifecycle,
        timestamp_ms: now_ms,
    });
}

/// Cancel `token` on Ctrl-C or SIGTERM, whichever arrives first.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
            match term {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler, watching ctrl-c only");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load()?;
    config.ensure_dirs()?;
    let _lock = acquire_lock(&config.lock_path)?;

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let snapshot = load_snapshot(&config.snapshot_path)?;
    let (start_seq, state) = match snapshot {
        Some(snap) => (snap.seq, snap.state),
        None => (0, MaterializedState::default()),
    };
    let state = Arc::new(RwLock::new(state));

    let wal = Wal::open(&config.wal_path, start_seq)?;
    let (bus, mut reader) = EventBus::new(wal);
    let wal_handle = reader.wal();

    let workflows = load_workflows(&config.workflows_dir);
    let mut workflow_defs = HashMap::new();
    let mut triggers = Vec::new();
    for (def, defs_triggers) in workflows {
        triggers.extend(defs_triggers);
        workflow_defs.insert(def.id.as_str().to_string(), def);
    }
    let workflow_defs = Arc::new(workflow_defs);
    let triggers = Arc::new(triggers);

    let roots = config
        .watch_roots
        .iter()
        .map(|p| WatchRoot {
            path: p.clone(),
            filter: relay_watch::WatchFilter::default(),
        })
        .collect::<Vec<_>>();

    let roots_for_reconciler = roots.clone();

    if !roots.is_empty() {
        let bus_for_watch = bus.clone();
        spawn_supervised(shutdown.clone(), "folder-watcher", move || {
            let bus = bus_for_watch.clone();
            let roots = roots.clone();
            async move {
                let mut watcher = match FolderWatcher::start(roots, Duration::from_millis(300)) {
                    Ok(watcher) => watcher,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to start folder watcher");
                        return;
                    }
                };
                while let Some(message) = watcher.recv().await {
                    match message {
                        WatchMessage::Change(change) => {
                            let event = Event {
                                id: EventId::new(uuid::Uuid::new_v4().to_string()),
                                kind: change.kind,
                                path: change.path,
                                prev_path: change.prev_path,
                                size_bytes: None,
                                mtime_ms: None,
                                content_hash: None,
                                detected_at_ms: unix_ms(),
                                status: EventStatus::Pending,
                                attempts: 0,
                                last_error: None,
                                claimed_by: None,
                                claimed_at_ms: None,
                            };
                            if let Err(e) = bus.send(event) {
                                tracing::warn!(error = %e, "failed to append event to wal");
                            }
                        }
                        WatchMessage::Overflow => {
                            tracing::warn!("watcher overflowed; reconciliation will catch up");
                        }
                    }
                }
            }
        });
    }

    let logs = LogSink::open(&config.logs_wal_path)?;
    let max_attempts = relay_daemon::env::event_max_attempts();

    let engine = Arc::new(Engine::new(ProcessorRegistry::with_builtins()));
    {
        let state = state.clone();
        let workflow_defs = workflow_defs.clone();
        let triggers = triggers.clone();
        let engine = engine.clone();
        let logs = logs.clone();
        let token = shutdown.clone();
        // The reader owns the WAL's sole wake-channel receiver, so unlike the
        // other background tasks it isn't cheaply reconstructable on panic;
        // this loop only stops cooperatively on shutdown, it isn't respawned.
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = reader.recv() => next,
                };
                match next {
                    Ok(Some(entry)) => {
                        state.write().await.apply_event(&entry.event);
                        let claimed = state.write().await.claim(1, "wal-consumer", unix_ms());
                        for event_id in claimed {
                            let Some(event) = state.read().await.get_event(&event_id).cloned() else {
                                continue;
                            };
                            let matched = relay_daemon::trigger_router::route(&triggers, &event);
                            let mut run_failed = None;
                            for workflow_id in matched {
                                let Some(def) = workflow_defs.get(workflow_id.as_str()) else {
                                    continue;
                                };
                                let mut run = Run::new(
                                    RunId::new(uuid::Uuid::new_v4().to_string()),
                                    def.id.clone(),
                                    def.version,
                                    HashMap::new(),
                                    unix_ms(),
                                );
                                if let Err(e) = engine.run(def, &mut run).await {
                                    tracing::warn!(run_id = run.id.short(8), error = %e, "run failed");
                                    run_failed = Some(e.to_string());
                                }
                            }
                            match run_failed {
                                None => state.write().await.complete(&event_id),
                                Some(error) => {
                                    let outcome = state.write().await.fail(&event_id, error, max_attempts);
                                    if outcome == Some(FailOutcome::Abandoned) {
                                        log_abandoned(&logs, &event_id, "run failed", unix_ms());
                                    }
                                }
                            }
                        }
                        reader.mark_processed(entry.seq);
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "event reader error");
                        break;
                    }
                }
            }
        });
    }

    {
        let state = state.clone();
        let logs = logs.clone();
        let interval_secs = relay_daemon::env::stale_sweep_interval_secs();
        let claim_ttl_ms = relay_daemon::env::claim_ttl_secs() * 1000;
        spawn_supervised(shutdown.clone(), "stale-release", move || {
            let state = state.clone();
            let logs = logs.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    ticker.tick().await;
                    let now = unix_ms();
                    let released = state.write().await.release_stale(now, claim_ttl_ms, max_attempts);
                    if released.retried > 0 || released.abandoned > 0 {
                        tracing::info!(
                            retried = released.retried,
                            abandoned = released.abandoned,
                            "released stale claims"
                        );
                    }
                    for event_id in &released.abandoned_ids {
                        log_abandoned(&logs, event_id, "claim exceeded ttl", now);
                    }
                }
            }
        });
    }

    {
        let state = state.clone();
        let wal_handle = wal_handle.clone();
        let checkpointer = Arc::new(Checkpointer::new(config.snapshot_path.clone()));
        let interval_secs = relay_daemon::env::checkpoint_interval_secs();
        spawn_supervised(shutdown.clone(), "checkpointer", move || {
            let state = state.clone();
            let wal_handle = wal_handle.clone();
            let checkpointer = checkpointer.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let seq = wal_handle.lock().processed_seq();
                    let snapshot_state = state.read().await.clone();
                    let handle = checkpointer.start(seq, &snapshot_state);
                    match tokio::task::spawn_blocking(move || handle.wait()).await {
                        Ok(Ok(result)) => {
                            if let Err(e) = wal_handle.lock().truncate_before(result.seq) {
                                tracing::warn!(error = %e, "failed to truncate wal after checkpoint");
                            }
                            tracing::info!(seq = result.seq, size_bytes = result.size_bytes, "checkpoint complete");
                        }
                        Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint failed"),
                        Err(e) => tracing::warn!(error = %e, "checkpoint task panicked"),
                    }
                }
            }
        });
    }

    if !roots_for_reconciler.is_empty() {
        let state = state.clone();
        let bus = bus.clone();
        let roots = roots_for_reconciler.clone();
        let interval_secs = relay_daemon::env::reconciliation_interval_secs();
        let high_watermark = relay_daemon::env::reconciliation_high_watermark();
        spawn_supervised(shutdown.clone(), "reconciler", move || {
            let state = state.clone();
            let bus = bus.clone();
            let roots = roots.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let pending = state.read().await.pending_queue_len();
                    if pending > high_watermark {
                        tracing::warn!(pending, high_watermark, "skipping reconciliation pass, queue backed up");
                        continue;
                    }

                    let roots = roots.clone();
                    let scan = tokio::task::spawn_blocking(move || {
                        let mut on_disk = Vec::new();
                        for root in &roots {
                            match relay_daemon::reconciler::scan_disk(&root.path, &root.filter) {
                                Ok(entries) => on_disk.extend(entries),
                                Err(e) => tracing::warn!(path = %root.path.display(), error = %e, "reconciliation scan failed"),
                            }
                        }
                        on_disk
                    })
                    .await;
                    let Ok(on_disk) = scan else {
                        tracing::warn!("reconciliation scan task panicked");
                        continue;
                    };

                    let done_by_path = {
                        let guard = state.read().await;
                        guard
                            .latest_done_by_path()
                            .into_iter()
                            .filter_map(|(path, event)| event.content_hash.clone().map(|hash| (path, hash)))
                            .collect()
                    };
                    // No vector-store integration is wired here (vector-database internals
                    // are out of scope); the index ground truth is empty, so orphan
                    // detection only activates once a caller wires a `VectorIndex`.
                    let report = relay_daemon::reconciler::diff(&on_disk, &done_by_path, &[]);
                    if report.is_empty() {
                        continue;
                    }

                    let events = relay_daemon::reconciler::synthesize_events(&report, unix_ms());
                    tracing::info!(
                        existing = report.existing.len(),
                        deleted = report.deleted_paths.len(),
                        modified = report.modified.len(),
                        orphaned = report.orphaned.len(),
                        "reconciliation pass found drift"
                    );
                    for event in events {
                        if let Err(e) = bus.send(event) {
                            tracing::warn!(error = %e, "failed to append synthesized event to wal");
                        }
                    }
                }
            }
        });
    }

    let auth = AuthGate::load(config.keys_path.clone());
    relay_daemon::auth::spawn_sighup_reload(auth.clone())?;

    {
        let logs = logs.clone();
        let interval_ms = relay_daemon::env::log_flush_interval_ms();
        let batch_size = relay_daemon::env::log_flush_batch_size();
        spawn_supervised(shutdown.clone(), "log-flusher", move || {
            let logs = logs.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
                loop {
                    ticker.tick().await;
                    logs.flush_ring(batch_size);
                }
            }
        });
    }

    let log_retention_policy = RetentionPolicy {
        compress_after_days: relay_daemon::env::log_compress_after_days(),
        retention_days: relay_daemon::env::log_retention_days(),
        archive_retention_days: relay_daemon::env::log_archive_retention_days(),
    };

    {
        let logs = logs.clone();
        let archives_dir = config.archives_dir.clone();
        let interval_secs = relay_daemon::env::maintenance_interval_secs();
        let policy = log_retention_policy;
        spawn_supervised(shutdown.clone(), "log-retention", move || {
            let logs = logs.clone();
            let archives_dir = archives_dir.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    ticker.tick().await;
                    let report = logs.sweep(unix_ms(), &policy, &archives_dir);
                    tracing::info!(
                        projects_swept = report.projects_swept,
                        entries_dropped = report.entries_dropped,
                        entries_archived = report.entries_archived,
                        archives_expired = report.archives_expired,
                        "log retention sweep"
                    );
                }
            }
        });
    }

    let app_state = AppState::new(
        auth,
        logs,
        workflow_defs.clone(),
        engine.clone(),
        config.archives_dir.clone(),
        log_retention_policy,
    );
    let app = relay_daemon::http::router(app_state);

    let addr: std::net::SocketAddr = config.http_addr.parse()?;
    tracing::info!(%addr, "relayd listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_for_server = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_server.cancelled().await })
        .await?;

    Ok(())
}
