//! Document bundle extraction
//!
//! A bundle is extracted into a staging directory next to the target and
//! renamed into place only after every entry was read in full (CRC checked),
//! so the indexer never sees a partial tree. Zip bundles are read with the
//! `zip` crate, RAR bundles with `unrar`; the uploader's extension picks one.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extraction failure; the target directory does not exist afterwards
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Unsupported archive type: {0} (only .zip and .rar bundles are accepted)")]
    Unsupported(String),

    #[error("Corrupt or incomplete archive: {0}")]
    Corrupt(String),

    #[error("Extraction target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("IO error during extraction: {0}")]
    Io(#[from] io::Error),
}

/// A fully materialized extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    pub root: PathBuf,
    pub files: usize,
}

/// Turns a compressed bundle into a directory tree
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `target`, which must not exist yet
    ///
    /// `original_name` is the uploader's filename.
    fn extract(&self, archive: &Path, original_name: &str, target: &Path) -> Result<ExtractedTree, ArchiveError>;
}

/// Supported bundle container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

impl ArchiveFormat {
    /// Format from a filename's extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Result<Self, ArchiveError> {
        let extension = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "rar" => Ok(ArchiveFormat::Rar),
            "" => Err(ArchiveError::Unsupported(filename.to_string())),
            other => Err(ArchiveError::Unsupported(format!(".{}", other))),
        }
    }
}

/// Dispatches to the zip or RAR extractor by the uploader's extension
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleExtractor {
    zip: ZipExtractor,
    rar: RarExtractor,
}

impl BundleExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveExtractor for BundleExtractor {
    fn extract(&self, archive: &Path, original_name: &str, target: &Path) -> Result<ExtractedTree, ArchiveError> {
        match ArchiveFormat::from_filename(original_name)? {
            ArchiveFormat::Zip => self.zip.extract(archive, original_name, target),
            ArchiveFormat::Rar => self.rar.extract(archive, original_name, target),
        }
    }
}

/// Run `fill` against a fresh staging directory and rename it to `target` on success
fn extract_staged(
    original_name: &str,
    target: &Path,
    fill: impl FnOnce(&Path) -> Result<usize, ArchiveError>,
) -> Result<ExtractedTree, ArchiveError> {
    if target.exists() {
        return Err(ArchiveError::TargetExists(target.to_path_buf()));
    }

    let staging = staging_path(target);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    match fill(&staging) {
        Ok(files) => {
            fs::rename(&staging, target)?;
            tracing::info!(archive = %original_name, target = %target.display(), files, "Bundle extracted");
            Ok(ExtractedTree {
                root: target.to_path_buf(),
                files,
            })
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                tracing::warn!(staging = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            Err(e)
        }
    }
}

/// Zip bundles via the `zip` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_into(&self, archive: &Path, staging: &Path) -> Result<usize, ArchiveError> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

        let mut files = 0;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ArchiveError::Corrupt(format!("entry {}: {}", i, e)))?;

            let name = decode_entry_name(entry.name_raw());
            let Some(relative) = sanitize_entry_path(&name)? else {
                continue;
            };
            let dest = staging.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::Corrupt(format!("{}: {}", name, e)))?;
            files += 1;
        }

        Ok(files)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, original_name: &str, target: &Path) -> Result<ExtractedTree, ArchiveError> {
        extract_staged(original_name, target, |staging| self.extract_into(archive, staging))
    }
}

/// RAR bundles via the `unrar` crate (RAR 2.9 through 5)
#[derive(Debug, Default, Clone, Copy)]
pub struct RarExtractor;

impl RarExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_into(&self, archive: &Path, staging: &Path) -> Result<usize, ArchiveError> {
        let mut cursor = unrar::Archive::new(archive).open_for_processing().map_err(corrupt)?;
        let mut files = 0;

        while let Some(header) = cursor.read_header().map_err(corrupt)? {
            let (name, is_file) = {
                let entry = header.entry();
                (entry.filename.to_string_lossy().into_owned(), !entry.is_directory())
            };

            cursor = match sanitize_entry_path(&name)? {
                Some(relative) if is_file => {
                    let dest = staging.join(&relative);
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let next = header
                        .extract_to(&dest)
                        .map_err(|e| ArchiveError::Corrupt(format!("{}: {}", name, e)))?;
                    files += 1;
                    next
                }
                Some(relative) => {
                    fs::create_dir_all(staging.join(&relative))?;
                    header.skip().map_err(corrupt)?
                }
                None => header.skip().map_err(corrupt)?,
            };
        }

        Ok(files)
    }
}

impl ArchiveExtractor for RarExtractor {
    fn extract(&self, archive: &Path, original_name: &str, target: &Path) -> Result<ExtractedTree, ArchiveError> {
        extract_staged(original_name, target, |staging| self.extract_into(archive, staging))
    }
}

fn corrupt(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Corrupt(e.to_string())
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    target.with_file_name(format!(".{}.partial", name))
}

/// Entry names without the UTF-8 flag are usually GBK on Chinese-locale Windows
pub fn decode_entry_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => {
            let (name, _, _) = encoding_rs::GBK.decode(raw);
            name.into_owned()
        }
    }
}

/// `C:` style prefix on the first path component
fn has_drive_prefix(component: &str) -> bool {
    let mut chars = component.chars();
    matches!((chars.next(), chars.next()), (Some(letter), Some(':')) if letter.is_ascii_alphabetic())
}

/// Relative path of an entry, `None` for entries that name no file
fn sanitize_entry_path(name: &str) -> Result<Option<PathBuf>, ArchiveError> {
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(ArchiveError::Corrupt(format!("absolute entry path: {}", name)));
    }

    let mut path = PathBuf::new();
    for (i, part) in name.split(['/', '\\']).enumerate() {
        match part {
            "" | "." => {}
            ".." => return Err(ArchiveError::Corrupt(format!("entry escapes bundle root: {}", name))),
            p if i == 0 && has_drive_prefix(p) => {
                return Err(ArchiveError::Corrupt(format!("drive-qualified entry path: {}", name)))
            }
            p => path.push(p),
        }
    }

    Ok((!path.as_os_str().is_empty()).then_some(path))
}
