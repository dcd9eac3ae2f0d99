//! Runtime configuration for tkm-recon
//!
//! Built once at startup from the resolved root folder and the TOML settings.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tkm_common::config::TomlConfig;
use tkm_common::Result;

/// Incoming uploads
pub const UPLOADS_DIR: &str = "uploads";
/// Per-session extracted document trees
pub const TEMP_DIR: &str = "temp";
/// Generated bundles
pub const OUTPUT_DIR: &str = "output";

/// The three working areas below the root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingAreas {
    pub uploads: PathBuf,
    pub temp: PathBuf,
    pub output: PathBuf,
}

impl WorkingAreas {
    pub fn under(root: &Path) -> Self {
        Self {
            uploads: root.join(UPLOADS_DIR),
            temp: root.join(TEMP_DIR),
            output: root.join(OUTPUT_DIR),
        }
    }

    /// Create any missing area
    pub fn ensure(&self) -> Result<()> {
        for dir in self.all() {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                tracing::info!("Created working area: {}", dir.display());
            }
        }
        Ok(())
    }

    pub fn all(&self) -> [PathBuf; 3] {
        [self.uploads.clone(), self.temp.clone(), self.output.clone()]
    }
}

/// Service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub areas: WorkingAreas,
    /// Sessions and working files older than this are swept
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub max_upload_bytes: u64,
    /// Document extension without the dot
    pub document_extension: String,
}

impl ServiceConfig {
    pub fn new(root_folder: PathBuf, toml: &TomlConfig) -> Self {
        Self {
            areas: WorkingAreas::under(&root_folder),
            root_folder,
            retention: Duration::from_secs(toml.retention_hours * 3600),
            sweep_interval: Duration::from_secs(toml.sweep_interval_minutes * 60),
            max_upload_bytes: toml.max_upload_mb * 1024 * 1024,
            document_extension: toml.document_extension.trim_start_matches('.').to_string(),
        }
    }

    /// Defaults below `root_folder`
    pub fn with_root(root_folder: impl Into<PathBuf>) -> Self {
        Self::new(root_folder.into(), &TomlConfig::default())
    }

    pub fn retention_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::hours(24))
    }
}
