//! Indexed per-participant documents

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::services::name_normalizer::normalize_name;

/// One document whose filename carried a (room, name) identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub path: PathBuf,
    pub filename: String,
    pub room: String,
    pub name: String,
    /// Cached [`normalize_name`] of `name`
    pub normalized_name: String,
}

impl DocumentEntry {
    pub fn new(path: PathBuf, filename: String, room: String, name: String) -> Self {
        let normalized_name = normalize_name(&name);
        Self {
            path,
            filename,
            room,
            name,
            normalized_name,
        }
    }
}

/// All matchable documents below one document root
///
/// Built once per session and shared read-only afterwards.
#[derive(Debug)]
pub struct DocumentIndex {
    root: PathBuf,
    entries: Vec<Arc<DocumentEntry>>,
    skipped: usize,
}

impl DocumentIndex {
    pub fn new(root: PathBuf, entries: Vec<DocumentEntry>, skipped: usize) -> Self {
        Self {
            root,
            entries: entries.into_iter().map(Arc::new).collect(),
            skipped,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[Arc<DocumentEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Documents with the expected extension whose filename did not fit the pattern
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Documents whose normalized name equals `normalized`
    pub fn with_normalized_name<'a>(
        &'a self,
        normalized: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Arc<DocumentEntry>)> + 'a {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, doc)| doc.normalized_name == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(room: &str, name: &str) -> DocumentEntry {
        let filename = format!("1-{}-{}--x.pdf", room, name);
        DocumentEntry::new(PathBuf::from(&filename), filename, room.to_string(), name.to_string())
    }

    #[test]
    fn test_entry_caches_normalized_name() {
        let doc = entry("203", "Wang Lei 0");
        assert_eq!(doc.normalized_name, "WANGLEIO");
    }

    #[test]
    fn test_lookup_by_normalized_name() {
        let index = DocumentIndex::new(
            PathBuf::from("/docs"),
            vec![entry("203", "李 雷"), entry("204", "韩梅梅"), entry("205", "李雷")],
            1,
        );
        let hits: Vec<usize> = index.with_normalized_name("李雷").map(|(i, _)| i).collect();
        assert_eq!(hits, vec![0, 2]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.skipped(), 1);
    }
}
