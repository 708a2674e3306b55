// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth Gate: `X-API-Key` authentication against a hot-reloadable key file.

use parking_lot::RwLock;
use relay_core::ApiKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("io error loading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("malformed key file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

fn load_keys(path: &Path) -> Result<Vec<ApiKey>, AuthError> {
    let content = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AuthError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Holds the current key set behind a lock so a SIGHUP reload can swap it
/// without blocking in-flight request authorization.
#[derive(Clone)]
pub struct AuthGate {
    path: PathBuf,
    keys: Arc<RwLock<Vec<ApiKey>>>,
}

impl AuthGate {
    /// Load the key file at `path`. A missing file means no keys are
    /// configured yet, not a startup failure — every request is then
    /// rejected until one is added and the daemon is reloaded.
    pub fn load(path: PathBuf) -> Self {
        let keys = load_keys(&path).unwrap_or_default();
        Self {
            path,
            keys: Arc::new(RwLock::new(keys)),
        }
    }

    /// Reread the key file from disk, logging only masked key material.
    pub fn reload(&self) -> Result<(), AuthError> {
        let keys = load_keys(&self.path)?;
        for key in &keys {
            info!(name = %key.name, key = %key.masked(), "loaded api key");
        }
        *self.keys.write() = keys;
        Ok(())
    }

    /// Find the key record matching `presented`, if it authorizes `project`
    /// and has not expired.
    pub fn authorize(&self, presented: &str, project: &str) -> Option<ApiKey> {
        self.keys
            .read()
            .iter()
            .find(|k| k.key == presented && k.authorizes_project(project) && !is_expired(k))
            .cloned()
    }

    /// Find the key record matching `presented`, ignoring project scoping.
    /// Used by endpoints that aren't tied to one project, such as the
    /// maintenance sweep.
    pub fn authorize_any(&self, presented: &str) -> Option<ApiKey> {
        self.keys
            .read()
            .iter()
            .find(|k| k.key == presented && !is_expired(k))
            .cloned()
    }
}

fn is_expired(key: &ApiKey) -> bool {
    let Some(expires_at) = &key.expires_at else {
        return false;
    };
    match chrono::DateTime::parse_from_rfc3339(expires_at) {
        Ok(expiry) => expiry < chrono::Utc::now(),
        Err(e) => {
            warn!(name = %key.name, error = %e, "unparsable api key expiry, treating as expired");
            true
        }
    }
}

/// Install a SIGHUP handler that reloads `gate` in the background for the
/// lifetime of the process.
pub fn spawn_sighup_reload(gate: AuthGate) -> Result<(), std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut stream = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        loop {
            stream.recv().await;
            match gate.reload() {
                Ok(()) => info!("reloaded api keys on SIGHUP"),
                Err(e) => warn!(error = %e, "failed to reload api keys on SIGHUP"),
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_keys(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn load_missing_file_yields_no_keys() {
        let gate = AuthGate::load(PathBuf::from("/nonexistent/api_keys.json"));
        assert!(gate.authorize("anything", "proj").is_none());
    }

    #[test]
    fn authorize_matches_key_and_project() {
        let (_dir, path) = write_keys(
            r#"[{"name": "n", "key": "secret", "allowed_projects": ["proj-a"], "expires_at": null}]"#,
        );
        let gate = AuthGate::load(path);
        assert!(gate.authorize("secret", "proj-a").is_some());
        assert!(gate.authorize("secret", "proj-b").is_none());
        assert!(gate.authorize("wrong", "proj-a").is_none());
    }

    #[test]
    fn authorize_rejects_expired_key() {
        let (_dir, path) = write_keys(
            r#"[{"name": "n", "key": "secret", "allowed_projects": [], "expires_at": "2000-01-01T00:00:00Z"}]"#,
        );
        let gate = AuthGate::load(path);
        assert!(gate.authorize("secret", "anything").is_none());
    }

    #[test]
    fn reload_picks_up_new_keys() {
        let (_dir, path) = write_keys(r#"[]"#);
        let gate = AuthGate::load(path.clone());
        assert!(gate.authorize("secret", "proj").is_none());

        std::fs::write(
            &path,
            r#"[{"name": "n", "key": "secret", "allowed_projects": [], "expires_at": null}]"#,
        )
        .unwrap();
        gate.reload().unwrap();
        assert!(gate.authorize("secret", "proj").is_some());
    }
}
