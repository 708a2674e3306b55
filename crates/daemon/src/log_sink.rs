// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log Sink: multi-tenant structured-log storage with durability, retention,
//! and indexed query over project/level/module/document correlation fields.
//!
//! Writes land in an in-memory ring buffer first; a background flusher
//! (driven from `main.rs`, same shape as the checkpointer) drains it in
//! batches into the write-ahead log so a crash between `append` and the next
//! flush loses at most one batch, not the whole sink. Live rows stay
//! queryable in memory; `sweep` compresses cold rows into zstd archive
//! segments on disk and eventually expires those segments too.

use chrono::{TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use relay_core::{LogEntry, LogId, LogLevel};
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Default retention window: entries older than this are dropped by `sweep`.
pub const DEFAULT_RETENTION_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Batch size the background flusher drains from the ring per tick.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Ring buffer capacity before the oldest unflushed entry is dropped.
const RING_MAX: usize = 50_000;

#[derive(Debug, Error)]
pub enum LogWalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL durability log for the sink, analogous in shape to the
/// event store's WAL but without checkpoint/truncate semantics: logs are
/// retired by `sweep`'s compress/cleanup phases instead of checkpointing.
struct LogWal {
    file: File,
}

impl LogWal {
    fn open(path: &Path) -> Result<Self, LogWalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        Ok(Self { file })
    }

    fn append_batch(&mut self, entries: &[LogEntry]) -> Result<(), LogWalError> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in entries {
            let mut line = serde_json::to_vec(entry)?;
            line.push(b'\n');
            self.file.write_all(&line)?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay every durable entry, skipping (and logging) any corrupt line
    /// rather than failing startup over one bad record.
    fn replay(path: &Path) -> Result<Vec<LogEntry>, LogWalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => out.push(entry),
                Err(e) => tracing::warn!(error = %e, "skipping corrupt log wal entry"),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MaintenanceReport {
    pub projects_swept: usize,
    pub entries_dropped: usize,
    pub entries_remaining: usize,
    pub entries_archived: usize,
    pub archives_expired: usize,
}

/// `compress_after_days`/`retention_days`/`archive_retention_days` sweep
/// schedule, mirroring §4.7's three-phase maintenance contract.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub compress_after_days: i64,
    pub retention_days: i64,
    pub archive_retention_days: i64,
}

impl RetentionPolicy {
    pub fn from_days(retention_days: i64) -> Self {
        Self {
            compress_after_days: retention_days,
            retention_days,
            archive_retention_days: retention_days,
        }
    }
}

/// Pointer row for a compressed day's worth of logs; the live table no
/// longer carries those rows once one of these exists.
#[derive(Debug, Clone, PartialEq)]
struct ArchivePointer {
    day: String,
    path: PathBuf,
    entry_count: usize,
    oldest_ms: i64,
    newest_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Filter set for the `GET /logs` read path. All set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub project: Option<String>,
    pub level: Option<LogLevel>,
    pub module: Option<String>,
    pub document_id: Option<String>,
    pub file_name: Option<String>,
    pub start_date_ms: Option<i64>,
    pub end_date_ms: Option<i64>,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

impl LogQuery {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        self.project.as_deref().map(|p| p == entry.project).unwrap_or(true)
            && self.level.map(|l| l == entry.level).unwrap_or(true)
            && self.module.as_deref().map(|m| m == entry.module).unwrap_or(true)
            && self.start_date_ms.map(|s| entry.timestamp_ms >= s).unwrap_or(true)
            && self.end_date_ms.map(|e| entry.timestamp_ms <= e).unwrap_or(true)
            && self.document_id.as_deref().map(|d| entry_matches_document(entry, d)).unwrap_or(true)
            && self.file_name.as_deref().map(|f| entry_matches_file(entry, f)).unwrap_or(true)
    }
}

fn entry_matches_document(entry: &LogEntry, document_id: &str) -> bool {
    entry.document_id.as_deref() == Some(document_id)
        || json_contains(&entry.context, "document_id", document_id)
        || json_contains(&entry.details, "document_id", document_id)
}

fn entry_matches_file(entry: &LogEntry, file_name: &str) -> bool {
    entry.file_name.as_deref() == Some(file_name)
        || json_contains(&entry.context, "file_name", file_name)
        || json_contains(&entry.details, "file_name", file_name)
}

fn entry_matches_hash(entry: &LogEntry, hash: &str) -> bool {
    json_contains(&entry.context, "file_hash", hash) || json_contains(&entry.details, "file_hash", hash)
}

fn json_contains(value: &Option<serde_json::Value>, field: &str, expected: &str) -> bool {
    value.as_ref().and_then(|v| v.get(field)).and_then(|v| v.as_str()) == Some(expected)
}

fn day_key(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "19700101".to_string())
}

struct Inner {
    projects: RwLock<HashMap<String, Vec<LogEntry>>>,
    ring: Mutex<VecDeque<LogEntry>>,
    dropped: AtomicU64,
    wal: Mutex<Option<LogWal>>,
    archives: RwLock<HashMap<String, ArchivePointer>>,
}

/// Multi-tenant log store: one append-only row set per project, indexed
/// queries, and a maintenance sweep. See module docs for the durability
/// and retention design.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    /// Pure in-memory sink with no durability WAL; used by tests and by
    /// callers that accept losing unflushed entries across a crash.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                projects: RwLock::new(HashMap::new()),
                ring: Mutex::new(VecDeque::new()),
                dropped: AtomicU64::new(0),
                wal: Mutex::new(None),
                archives: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Open (or create) the durability WAL at `path` and replay its
    /// contents into the live table before accepting new writes.
    pub fn open(path: &Path) -> Result<Self, LogWalError> {
        let replayed = LogWal::replay(path)?;
        let wal = LogWal::open(path)?;
        let sink = Self::new();
        {
            let mut projects = sink.inner.projects.write();
            for entry in replayed {
                projects.entry(entry.project.clone()).or_default().push(entry);
            }
        }
        *sink.inner.wal.lock() = Some(wal);
        Ok(sink)
    }

    pub fn append(&self, entry: LogEntry) {
        self.inner.projects.write().entry(entry.project.clone()).or_default().push(entry.clone());

        let mut ring = self.inner.ring.lock();
        if ring.len() >= RING_MAX {
            ring.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                dropped_total = self.inner.dropped.load(Ordering::Relaxed),
                "log ring buffer full, dropping oldest unflushed entry"
            );
        }
        ring.push_back(entry);
    }

    /// Drain up to `batch_size` ring entries into the durability WAL.
    /// Entries stay visible in the live table throughout: this only closes
    /// the durability gap, it never affects query results.
    pub fn flush_ring(&self, batch_size: usize) -> usize {
        let batch: Vec<LogEntry> = {
            let mut ring = self.inner.ring.lock();
            let n = batch_size.min(ring.len());
            ring.drain(..n).collect()
        };
        if batch.is_empty() {
            return 0;
        }
        let mut wal = self.inner.wal.lock();
        if let Some(wal) = wal.as_mut() {
            if let Err(e) = wal.append_batch(&batch) {
                tracing::warn!(error = %e, count = batch.len(), "failed to flush log batch to wal");
            }
        }
        batch.len()
    }

    pub fn get(&self, project: &str, id: &LogId) -> Option<LogEntry> {
        self.inner.projects.read().get(project).and_then(|entries| entries.iter().find(|e| &e.id == id)).cloned()
    }

    /// Project-agnostic lookup for `GET /logs/{id}`.
    pub fn get_by_id(&self, id: &LogId) -> Option<LogEntry> {
        self.inner.projects.read().values().flat_map(|entries| entries.iter()).find(|e| &e.id == id).cloned()
    }

    /// Filter, sort, and paginate across one project (or all, if
    /// `query.project` is unset), per §4.7's read-path contract.
    pub fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
        let guard = self.inner.projects.read();
        let mut matched: Vec<LogEntry> = match &query.project {
            Some(project) => guard.get(project.as_str()).into_iter().flatten().filter(|e| query.matches(e)).cloned().collect(),
            None => guard.values().flatten().filter(|e| query.matches(e)).cloned().collect(),
        };
        drop(guard);

        matched.sort_by_key(|e| e.timestamp_ms);
        if query.sort_order == SortOrder::Desc {
            matched.reverse();
        }

        let limit = query.limit.min(1000);
        matched.into_iter().skip(query.offset).take(limit).collect()
    }

    /// Entries correlated to a specific document, within one project.
    pub fn by_document(&self, project: &str, document_id: &str) -> Vec<LogEntry> {
        self.inner
            .projects
            .read()
            .get(project)
            .map(|entries| entries.iter().filter(|e| entry_matches_document(e, document_id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Per-document history across every project, ascending by timestamp.
    pub fn lifecycle_by_document(&self, document_id: &str) -> Vec<LogEntry> {
        self.correlate(|e| entry_matches_document(e, document_id))
    }

    /// Per-filename history across every project, ascending by timestamp.
    pub fn lifecycle_by_file(&self, file_name: &str) -> Vec<LogEntry> {
        self.correlate(|e| entry_matches_file(e, file_name))
    }

    /// Per-content-hash history across every project, ascending by timestamp.
    pub fn lifecycle_by_hash(&self, hash: &str) -> Vec<LogEntry> {
        self.correlate(|e| entry_matches_hash(e, hash))
    }

    fn correlate(&self, predicate: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        let mut matched: Vec<LogEntry> =
            self.inner.projects.read().values().flatten().filter(|e| predicate(e)).cloned().collect();
        matched.sort_by_key(|e| e.timestamp_ms);
        matched
    }

    /// `DELETE /logs/cleanup`: prune entries older than `before_ms`,
    /// optionally scoped to one project.
    pub fn cleanup(&self, project: Option<&str>, before_ms: i64) -> MaintenanceReport {
        let mut guard = self.inner.projects.write();
        let mut report = MaintenanceReport::default();
        let targets: Vec<&mut Vec<LogEntry>> = match project {
            Some(p) => guard.get_mut(p).into_iter().collect(),
            None => guard.values_mut().collect(),
        };
        for entries in targets {
            let before = entries.len();
            entries.retain(|e| e.timestamp_ms >= before_ms);
            let dropped = before - entries.len();
            if dropped > 0 {
                report.projects_swept += 1;
                report.entries_dropped += dropped;
            }
        }
        report.entries_remaining = guard.values().map(|v| v.len()).sum();
        report
    }

    /// `DELETE /logs/cleanup/all`: destructive hard reset of every live row
    /// and archive pointer, regardless of age.
    pub fn cleanup_all(&self) -> MaintenanceReport {
        let mut guard = self.inner.projects.write();
        let entries_dropped: usize = guard.values().map(|v| v.len()).sum();
        let projects_swept = guard.len();
        guard.clear();
        self.inner.archives.write().clear();
        MaintenanceReport {
            projects_swept,
            entries_dropped,
            entries_remaining: 0,
            entries_archived: 0,
            archives_expired: 0,
        }
    }

    /// Three-phase retention sweep: compress cold-but-live rows into daily
    /// zstd archive segments, cleanup anything past the live retention
    /// window outright, then expire archive segments past their own
    /// retention window. Each phase is transactional per batch: a segment
    /// is written and fsynced before its source rows are dropped from the
    /// live table, so a crash mid-compress leaves the rows live (re-run on
    /// next sweep) rather than losing them.
    pub fn sweep(&self, now_ms: i64, policy: &RetentionPolicy, archive_dir: &Path) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        let compress_cutoff = now_ms - policy.compress_after_days * 24 * 60 * 60 * 1000;
        let retention_cutoff = now_ms - policy.retention_days * 24 * 60 * 60 * 1000;
        let archive_cutoff_days = policy.archive_retention_days;

        // Phase 1: compress.
        let mut by_day: HashMap<String, Vec<LogEntry>> = HashMap::new();
        {
            let mut guard = self.inner.projects.write();
            for entries in guard.values_mut() {
                let mut i = 0;
                while i < entries.len() {
                    let ts = entries[i].timestamp_ms;
                    if ts < compress_cutoff && ts >= retention_cutoff {
                        by_day.entry(day_key(ts)).or_default().push(entries.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
        }
        for (day, entries) in by_day {
            match write_archive_segment(archive_dir, &day, &entries) {
                Ok(path) => {
                    report.entries_archived += entries.len();
                    let mut archives = self.inner.archives.write();
                    let pointer = archives.entry(day.clone()).or_insert_with(|| ArchivePointer {
                        day: day.clone(),
                        path,
                        entry_count: 0,
                        oldest_ms: i64::MAX,
                        newest_ms: i64::MIN,
                    });
                    pointer.entry_count += entries.len();
                    pointer.oldest_ms = pointer.oldest_ms.min(entries.iter().map(|e| e.timestamp_ms).min().unwrap_or(i64::MAX));
                    pointer.newest_ms = pointer.newest_ms.max(entries.iter().map(|e| e.timestamp_ms).max().unwrap_or(i64::MIN));
                }
                Err(e) => tracing::warn!(day, error = %e, "failed to write log archive segment, leaving rows live"),
            }
        }

        // Phase 2: cleanup anything past the live window outright (rows
        // never compressed, e.g. compress_after_days >= retention_days).
        let cleanup_report = self.cleanup(None, retention_cutoff);
        report.projects_swept = cleanup_report.projects_swept;
        report.entries_dropped = cleanup_report.entries_dropped;
        report.entries_remaining = cleanup_report.entries_remaining;

        // Phase 3: expire archive segments past their own retention window.
        let expired: Vec<String> = self
            .inner
            .archives
            .read()
            .values()
            .filter(|p| day_age_days(&p.day, now_ms) > archive_cutoff_days)
            .map(|p| p.day.clone())
            .collect();
        for day in expired {
            let mut archives = self.inner.archives.write();
            if let Some(pointer) = archives.remove(&day) {
                if let Err(e) = std::fs::remove_file(&pointer.path) {
                    tracing::warn!(day, error = %e, "failed to remove expired log archive segment");
                }
                report.archives_expired += 1;
            }
        }

        report
    }
}

fn write_archive_segment(archive_dir: &Path, day: &str, entries: &[LogEntry]) -> io::Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)?;
    let path = archive_dir.join(format!("{day}.zst"));

    // Append to any rows already archived for this day before recompressing,
    // so repeated sweeps accumulate rather than overwrite.
    let mut existing = read_archive_segment(&path).unwrap_or_default();
    existing.extend_from_slice(entries);

    let json = serde_json::to_vec(&existing)?;
    let compressed = zstd::encode_all(json.as_slice(), 3)?;
    let tmp_path = path.with_extension("zst.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(&compressed)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

fn read_archive_segment(path: &Path) -> io::Result<Vec<LogEntry>> {
    let compressed = std::fs::read(path)?;
    let json = zstd::decode_all(compressed.as_slice())?;
    Ok(serde_json::from_slice(&json)?)
}

fn day_age_days(day: &str, now_ms: i64) -> i64 {
    let Ok(naive) = chrono::NaiveDate::parse_from_str(day, "%Y%m%d") else {
        return 0;
    };
    let day_ms = naive.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis()).unwrap_or(now_ms);
    (now_ms - day_ms) / (24 * 60 * 60 * 1000)
}
