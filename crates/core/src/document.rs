// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The indexed-document side of the reconciler's three-way diff: what the
//! vector store / downstream index believes is on disk.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

crate::define_id! {
    /// Content-addressed identifier for a [`DocumentRecord`].
    pub struct DocumentId;
}

impl DocumentId {
    /// Derive the deterministic id for a path: the same file always maps
    /// to the same `DocumentId`, independent of when or how it was indexed.
    pub fn for_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self::new(hex)
    }
}

/// A record of a file as last indexed by a downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub path: PathBuf,
    pub content_hash: String,
    pub size_bytes: u64,
    pub indexed_at_ms: i64,
    pub source_event_id: Option<String>,
}

impl DocumentRecord {
    pub fn new(id: DocumentId, path: PathBuf, content_hash: String, size_bytes: u64, indexed_at_ms: i64) -> Self {
        Self {
            id,
            path,
            content_hash,
            size_bytes,
            indexed_at_ms,
            source_event_id: None,
        }
    }

    /// Whether the document's recorded hash matches a hash observed on disk.
    pub fn matches_hash(&self, other: &str) -> bool {
        self.content_hash == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_path_is_deterministic_and_path_sensitive() {
        let a = DocumentId::for_path(Path::new("/docs/report.pdf"));
        let b = DocumentId::for_path(Path::new("/docs/report.pdf"));
        let c = DocumentId::for_path(Path::new("/docs/other.pdf"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn matches_hash_is_exact() {
        let doc = DocumentRecord::new(
            DocumentId::new("doc-1"),
            PathBuf::from("/a"),
            "abc123".into(),
            10,
            0,
        );
        assert!(doc.matches_hash("abc123"));
        assert!(!doc.matches_hash("def456"));
    }
}
