//! Document index construction
//!
//! Recursive document discovery below an extracted bundle. Every document's
//! identity comes from its filename alone:
//!
//! `<prefix>-<room digits>-<name>--<suffix>.<ext>`
//!
//! Files that do not fit the pattern are left out of the index (they can
//! never be matched) without failing the scan.

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::models::{DocumentEntry, DocumentIndex};

/// Document indexing errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Document root does not exist
    #[error("Document root not found: {0}")]
    RootNotFound(PathBuf),

    /// Document root exists but is not a directory
    #[error("Document root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Filename pattern could not be built for the configured extension
    #[error("Invalid document filename pattern: {0}")]
    Pattern(String),
}

/// Filename-driven document indexer
#[derive(Debug, Clone)]
pub struct DocumentIndexer {
    extension: String,
    pattern: Regex,
    ignore_patterns: Vec<String>,
}

impl DocumentIndexer {
    /// Indexer for documents with `extension` (with or without leading dot)
    pub fn new(extension: &str) -> Result<Self, IndexError> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let pattern = Regex::new(&format!(
            r"(?i)^.*?-([0-9]+)-([^-]+)--.*\.{}$",
            regex::escape(&extension)
        ))
        .map_err(|e| IndexError::Pattern(e.to_string()))?;

        Ok(Self {
            extension,
            pattern,
            ignore_patterns: vec![
                "__MACOSX".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
            ],
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// (room, name) encoded in a document filename
    pub fn parse_filename(&self, filename: &str) -> Option<(String, String)> {
        let captures = self.pattern.captures(filename)?;
        let room = captures.get(1)?.as_str().trim().to_string();
        let name = captures.get(2)?.as_str().trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some((room, name))
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase() == self.extension)
            .unwrap_or(false)
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        // The root itself is always walked
        if entry.depth() == 0 {
            return true;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with("._") {
            return false;
        }
        !self.ignore_patterns.iter().any(|p| file_name == p.as_str())
    }

    /// Scan `root` recursively and build the index
    pub fn scan(&self, root: &Path) -> Result<DocumentIndex, IndexError> {
        if !root.exists() {
            return Err(IndexError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root.to_path_buf()));
        }

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        let mut files_seen = 0usize;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            files_seen += 1;

            let path = entry.path();
            if !self.has_extension(path) {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            match self.parse_filename(&filename) {
                Some((room, name)) => {
                    entries.push(DocumentEntry::new(path.to_path_buf(), filename, room, name));
                }
                None => {
                    tracing::debug!(file = %filename, "Filename does not match document pattern, skipped");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                root = %root.display(),
                skipped,
                "Some documents could not be identified from their filenames"
            );
        }
        tracing::info!(
            root = %root.display(),
            files = files_seen,
            documents = entries.len(),
            "Document index built"
        );

        Ok(DocumentIndex::new(root.to_path_buf(), entries, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn indexer() -> DocumentIndexer {
        DocumentIndexer::new("pdf").unwrap()
    }

    #[test]
    fn test_parse_filename() {
        let idx = indexer();
        assert_eq!(
            idx.parse_filename("2-203-李雷--船票.pdf"),
            Some(("203".to_string(), "李雷".to_string()))
        );
        assert_eq!(
            idx.parse_filename("TKT-0815- WANG LEI --20240501.PDF"),
            Some(("0815".to_string(), "WANG LEI".to_string()))
        );
        // Lazy prefix: the first "-digits-name--" run wins
        assert_eq!(
            idx.parse_filename("A-B-12-韩梅梅--x-y.pdf"),
            Some(("12".to_string(), "韩梅梅".to_string()))
        );
    }

    #[test]
    fn test_parse_filename_rejects_non_matching() {
        let idx = indexer();
        assert_eq!(idx.parse_filename("李雷.pdf"), None);
        assert_eq!(idx.parse_filename("2-203-李雷-船票.pdf"), None);
        assert_eq!(idx.parse_filename("2-abc-李雷--船票.pdf"), None);
        assert_eq!(idx.parse_filename("2-203-李雷--船票.jpg"), None);
        assert_eq!(idx.parse_filename("2-203- --船票.pdf"), None);
    }

    #[test]
    fn test_extension_configurable() {
        let idx = DocumentIndexer::new(".JPG").unwrap();
        assert_eq!(idx.extension(), "jpg");
        assert!(idx.parse_filename("2-203-李雷--x.jpg").is_some());
        assert!(idx.parse_filename("2-203-李雷--x.pdf").is_none());
    }

    #[test]
    fn test_scan_recursive_and_skips_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("day1/boat")).unwrap();
        fs::create_dir_all(root.join("__MACOSX/day1")).unwrap();
        fs::write(root.join("day1/1-203-李雷--a.pdf"), b"%PDF").unwrap();
        fs::write(root.join("day1/boat/1-204-韩梅梅--a.pdf"), b"%PDF").unwrap();
        fs::write(root.join("day1/readme.txt"), b"x").unwrap();
        fs::write(root.join("day1/unnamed.pdf"), b"%PDF").unwrap();
        fs::write(root.join("day1/._1-203-李雷--a.pdf"), b"x").unwrap();
        fs::write(root.join("__MACOSX/day1/1-203-李雷--a.pdf"), b"x").unwrap();

        let index = indexer().scan(root).unwrap();
        let names: Vec<&str> = index.entries().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["李雷", "韩梅梅"]);
        assert_eq!(index.skipped(), 1);
        assert_eq!(index.entries()[1].room, "204");
        assert_eq!(index.entries()[1].normalized_name, "韩梅梅");
    }

    #[test]
    fn test_scan_missing_root() {
        let result = indexer().scan(Path::new("/nonexistent/path/for/scan"));
        assert!(matches!(result, Err(IndexError::RootNotFound(_))));
    }

    #[test]
    fn test_scan_file_as_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.pdf");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(indexer().scan(&file), Err(IndexError::NotADirectory(_))));
    }
}
