//! Output bundle packaging

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Document missing or unreadable: {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write bundle: {0}")]
    Write(String),

    #[error("IO error while packaging: {0}")]
    Io(#[from] io::Error),
}

impl From<zip::result::ZipError> for PackageError {
    fn from(e: zip::result::ZipError) -> Self {
        PackageError::Write(e.to_string())
    }
}

/// Writes one archive containing exactly the given files
pub trait BundlePackager: Send + Sync {
    /// `files` are (source path, entry name) pairs, written in order
    fn package(&self, files: &[(PathBuf, String)], output: &Path) -> Result<(), PackageError>;
}

/// Deflate-compressed zip bundles
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipPackager;

impl ZipPackager {
    pub fn new() -> Self {
        Self
    }

    fn write_bundle(&self, files: &[(PathBuf, String)], output: &Path) -> Result<(), PackageError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = zip::ZipWriter::new(BufWriter::new(File::create(output)?));

        for (source, entry_name) in files {
            let mut input = File::open(source).map_err(|e| PackageError::Source {
                path: source.clone(),
                source: e,
            })?;
            writer.start_file(entry_name.as_str(), options)?;
            io::copy(&mut input, &mut writer)?;
        }

        writer.finish()?;
        Ok(())
    }
}

impl BundlePackager for ZipPackager {
    fn package(&self, files: &[(PathBuf, String)], output: &Path) -> Result<(), PackageError> {
        let result = self.write_bundle(files, output);
        if result.is_err() {
            let _ = fs::remove_file(output);
        }
        result
    }
}

/// Entry names for `filenames`; repeats get a " (n)" suffix before the extension
pub fn unique_entry_names<'a>(filenames: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    filenames
        .into_iter()
        .map(|name| {
            if used.insert(name.to_string()) {
                return name.to_string();
            }
            let path = Path::new(name);
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let mut n = 2;
            loop {
                let candidate = format!("{} ({}){}", stem, n, ext);
                if used.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_unique_entry_names() {
        let names = unique_entry_names(["a.pdf", "b.pdf", "a.pdf", "a.pdf", "a (2).pdf"]);
        assert_eq!(names, vec!["a.pdf", "b.pdf", "a (2).pdf", "a (3).pdf", "a (2) (2).pdf"]);
    }

    #[test]
    fn test_package_writes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("1-203-李雷--票.pdf");
        let second = dir.path().join("2-204-韩梅梅--票.pdf");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        let output = dir.path().join("out.zip");
        ZipPackager::new()
            .package(
                &[
                    (first, "1-203-李雷--票.pdf".to_string()),
                    (second, "2-204-韩梅梅--票.pdf".to_string()),
                ],
                &output,
            )
            .unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("2-204-韩梅梅--票.pdf")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
    }

    #[test]
    fn test_missing_source_removes_partial_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.zip");
        let err = ZipPackager::new()
            .package(&[(dir.path().join("gone.pdf"), "gone.pdf".to_string())], &output)
            .unwrap_err();

        assert!(matches!(err, PackageError::Source { .. }));
        assert!(!output.exists());
    }
}
