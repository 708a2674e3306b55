// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Resolve state directory: RELAY_STATE_DIR > XDG_STATE_HOME/relay > ~/.local/state/relay
pub fn state_dir() -> Result<PathBuf, crate::config::ConfigError> {
    if let Ok(dir) = std::env::var("RELAY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("relay"));
    }
    let home = std::env::var("HOME").map_err(|_| crate::config::ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/relay"))
}

/// HTTP bind address override.
pub fn http_addr() -> String {
    std::env::var("RELAY_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:4180".to_string())
}

/// `tracing_subscriber::EnvFilter` directive override.
pub fn log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

/// `compact` (default) or `json`, matching `tracing-subscriber`'s formatters.
pub fn log_format() -> String {
    std::env::var("RELAY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string())
}

/// Directory of workflow definition files (`.hcl`/`.toml`/`.json`), loaded at startup.
pub fn workflows_dir() -> Option<PathBuf> {
    std::env::var("RELAY_WORKFLOWS_DIR").ok().map(PathBuf::from)
}

/// Colon-separated list of folders to watch. Empty means the daemon serves
/// the HTTP surface without watching anything.
pub fn watch_roots() -> Vec<PathBuf> {
    std::env::var("RELAY_WATCH_ROOTS")
        .ok()
        .map(|v| v.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
        .unwrap_or_default()
}

/// Interval between background WAL checkpoints.
pub fn checkpoint_interval_secs() -> u64 {
    std::env::var("RELAY_CHECKPOINT_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300)
}

/// How long a log entry survives before the retention sweep drops it.
pub fn log_retention_days() -> i64 {
    std::env::var("RELAY_LOG_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

/// Interval between background log retention sweeps.
pub fn maintenance_interval_secs() -> u64 {
    std::env::var("RELAY_MAINTENANCE_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600)
}

/// How long a claim may be held before `release_stale` treats its handler
/// as crashed and reclaims the event.
pub fn claim_ttl_secs() -> i64 {
    std::env::var("RELAY_CLAIM_TTL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300)
}

/// Interval between background sweeps for stale (crashed-handler) claims.
pub fn stale_sweep_interval_secs() -> u64 {
    std::env::var("RELAY_STALE_SWEEP_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

/// Attempts (claim + retries) an event gets before it is abandoned.
pub fn event_max_attempts() -> u32 {
    std::env::var("RELAY_EVENT_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

/// Interval between full disk/store/index reconciliation passes.
pub fn reconciliation_interval_secs() -> u64 {
    std::env::var("RELAY_RECONCILIATION_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600)
}

/// Pending-queue length above which a reconciliation pass is skipped
/// rather than adding to the backlog.
pub fn reconciliation_high_watermark() -> usize {
    std::env::var("RELAY_RECONCILIATION_HIGH_WATERMARK")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10_000)
}

/// Interval between background drains of the log sink's ring buffer into
/// its durability WAL.
pub fn log_flush_interval_ms() -> u64 {
    std::env::var("RELAY_LOG_FLUSH_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000)
}

/// Max entries the log flusher drains from the ring per tick.
pub fn log_flush_batch_size() -> usize {
    std::env::var("RELAY_LOG_FLUSH_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(crate::log_sink::DEFAULT_BATCH_SIZE)
}

/// Days a live log row survives before the sweep compresses it into an
/// archive segment. Defaults to the same window as `log_retention_days`,
/// which disables compression (everything past the window is cleaned up
/// outright instead).
pub fn log_compress_after_days() -> i64 {
    std::env::var("RELAY_LOG_COMPRESS_AFTER_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(log_retention_days)
}

/// Days an archive segment survives before the sweep deletes it outright.
pub fn log_archive_retention_days() -> i64 {
    std::env::var("RELAY_LOG_ARCHIVE_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(365)
}
