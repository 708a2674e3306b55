// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API key records for the Auth Gate.

use serde::{Deserialize, Serialize};

/// A loaded API key entry, as persisted in `config/api_keys.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
    /// Projects this key is authorized to read/write logs for. An empty
    /// list means the key is authorized for every project.
    #[serde(default)]
    pub allowed_projects: Vec<String>,
    /// RFC 3339 expiry timestamp; `None` means the key never expires.
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl ApiKey {
    pub fn authorizes_project(&self, project: &str) -> bool {
        self.allowed_projects.is_empty() || self.allowed_projects.iter().any(|p| p == project)
    }

    /// Masks all but the first and last four characters, for safe logging.
    /// Grounded in the reference service's `mask_api_key`.
    pub fn masked(&self) -> String {
        mask_key(&self.key)
    }
}

pub fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 8 {
        return "*".repeat(len);
    }
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(len - 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_keeps_head_and_tail() {
        assert_eq!(mask_key("abcd1234efgh5678"), "abcd********5678");
    }

    #[test]
    fn masked_short_key_is_fully_hidden() {
        assert_eq!(mask_key("short"), "*****");
    }

    #[test]
    fn authorizes_project_empty_list_means_all() {
        let key = ApiKey {
            name: "n".into(),
            key: "k".into(),
            allowed_projects: vec![],
            expires_at: None,
        };
        assert!(key.authorizes_project("anything"));
    }

    #[test]
    fn authorizes_project_checks_membership() {
        let key = ApiKey {
            name: "n".into(),
            key: "k".into(),
            allowed_projects: vec!["proj-a".into()],
            expires_at: None,
        };
        assert!(key.authorizes_project("proj-a"));
        assert!(!key.authorizes_project("proj-b"));
    }
}
