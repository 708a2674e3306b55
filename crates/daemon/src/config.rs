// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration and on-disk layout.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a state directory: $HOME is not set")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon configuration: every path the daemon reads from or writes to.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub runs_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub logs_wal_path: PathBuf,
    pub archives_dir: PathBuf,
    pub keys_path: PathBuf,
    pub http_addr: String,
    pub workflows_dir: PathBuf,
    pub watch_roots: Vec<PathBuf>,
}

impl Config {
    /// Load configuration for the single user-level daemon instance.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = crate::env::state_dir()?;
        let workflows_dir = crate::env::workflows_dir().unwrap_or_else(|| state_dir.join("workflows"));
        Ok(Self {
            lock_path: state_dir.join("daemon.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.json"),
            runs_dir: state_dir.join("runs"),
            logs_dir: state_dir.join("logs"),
            logs_wal_path: state_dir.join("logs").join("logs.wal"),
            archives_dir: state_dir.join("archives"),
            keys_path: state_dir.join("api_keys.json"),
            http_addr: crate::env::http_addr(),
            watch_roots: crate::env::watch_roots(),
            workflows_dir,
            state_dir,
        })
    }

    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::create_dir_all(self.wal_path.parent().expect("wal_path has a parent"))?;
        std::fs::create_dir_all(&self.runs_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        std::fs::create_dir_all(&self.archives_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dirs_creates_the_full_layout() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("RELAY_STATE_DIR", tmp.path());
        let config = Config::load().unwrap();
        config.ensure_dirs().unwrap();
        assert!(config.wal_path.parent().unwrap().is_dir());
        assert!(config.runs_dir.is_dir());
        assert!(config.logs_dir.is_dir());
        std::env::remove_var("RELAY_STATE_DIR");
    }
}
