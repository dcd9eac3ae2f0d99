//! Uploaded files held on disk for the duration of a request or a pending entry

use std::path::{Path, PathBuf};

/// An uploaded file in the uploads area, deleted when dropped
///
/// Shared through `Arc` by every pending entry created from the same upload,
/// so the file lives exactly as long as the last entry that needs it.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
    original_name: String,
}

impl UploadedFile {
    pub fn new(path: PathBuf, original_name: impl Into<String>) -> Self {
        Self {
            path,
            original_name: original_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filename as supplied by the uploader
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Original name without its extension
    pub fn stem(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.original_name.clone())
    }

    /// Lowercased extension of the original name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Released upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.xlsx");
        std::fs::write(&path, b"data").unwrap();

        let upload = UploadedFile::new(path.clone(), "名单.xlsx");
        assert_eq!(upload.stem(), "名单");
        assert_eq!(upload.extension().as_deref(), Some("xlsx"));
        drop(upload);

        assert!(!path.exists());
    }

    #[test]
    fn test_shared_upload_lives_until_last_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        std::fs::write(&path, b"data").unwrap();

        let first = std::sync::Arc::new(UploadedFile::new(path.clone(), "roster.CSV"));
        let second = std::sync::Arc::clone(&first);
        assert_eq!(first.extension().as_deref(), Some("csv"));

        drop(first);
        assert!(path.exists());
        drop(second);
        assert!(!path.exists());
    }
}
