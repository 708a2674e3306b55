// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Include/exclude policy applied to raw filesystem notifications before
//! they're allowed into the debounce window.

use std::path::Path;

/// Decides whether a changed path is worth turning into an [`relay_core::Event`].
#[derive(Debug, Clone)]
pub struct WatchFilter {
    /// Lower-cased extensions (without the dot) to allow. Empty means allow all.
    pub extensions: Vec<String>,
    pub include_hidden: bool,
    pub max_size_bytes: Option<u64>,
}

impl Default for WatchFilter {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            include_hidden: false,
            max_size_bytes: None,
        }
    }
}

impl WatchFilter {
    pub fn allows_path(&self, path: &Path) -> bool {
        if !self.include_hidden && path_has_hidden_component(path) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    pub fn allows_size(&self, size_bytes: u64) -> bool {
        match self.max_size_bytes {
            Some(max) => size_bytes <= max,
            None => true,
        }
    }
}

fn path_has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false)
    })
}
