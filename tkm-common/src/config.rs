//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a single TOML file. Every key is optional;
//! a missing file means "all defaults", a malformed file is an error.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name used under OS config/data directories
pub const APP_DIR_NAME: &str = "ticketmatch";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Working area root (uploads, extracted trees, output bundles)
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    pub port: u16,

    /// HTTP bind address
    pub bind_address: String,

    /// Sessions and working files older than this are swept
    pub retention_hours: u64,

    /// Period of the retention sweep
    pub sweep_interval_minutes: u64,

    /// Per-upload size ceiling in megabytes
    pub max_upload_mb: u64,

    /// Extension (without dot) of the per-participant documents
    pub document_extension: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: 3000,
            bind_address: "127.0.0.1".to_string(),
            retention_hours: 24,
            sweep_interval_minutes: 60,
            max_upload_mb: 200,
            document_extension: "pdf".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<()> {
        if self.retention_hours == 0 {
            return Err(Error::Config("retention_hours must be at least 1".to_string()));
        }
        if self.sweep_interval_minutes == 0 {
            return Err(Error::Config(
                "sweep_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(Error::Config("max_upload_mb must be at least 1".to_string()));
        }
        let ext = self.document_extension.trim_start_matches('.');
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Config(format!(
                "document_extension must be alphanumeric, got '{}'",
                self.document_extension
            )));
        }
        Ok(())
    }
}

/// Load TOML configuration from `path`
///
/// A missing file is not an error: defaults are returned with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.validate()?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default config file location: `<os config dir>/ticketmatch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/ticketmatch (or /var/lib/ticketmatch for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/var/lib").join(APP_DIR_NAME))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support").join(APP_DIR_NAME))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData").join(APP_DIR_NAME))
    } else {
        PathBuf::from("./ticketmatch_data")
    }
}

/// Root folder resolution following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    env_var_name: String,
}

impl RootFolderResolver {
    pub fn new(env_var_name: impl Into<String>) -> Self {
        Self {
            env_var_name: env_var_name.into(),
        }
    }

    pub fn resolve(&self, cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
        if let Some(path) = cli_arg {
            info!("Root folder from command line: {}", path.display());
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                info!("Root folder from {}: {}", self.env_var_name, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &toml.root_folder {
            info!("Root folder from config file: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!("Root folder from compiled default: {}", path.display());
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.sweep_interval_minutes, 60);
        assert_eq!(config.max_upload_mb, 200);
        assert_eq!(config.document_extension, "pdf");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str("port = 8080\n[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.retention_hours, 24);
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let config = TomlConfig {
            retention_hours: 0,
            ..TomlConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_extension() {
        let config = TomlConfig {
            document_extension: "p.df".to_string(),
            ..TomlConfig::default()
        };
        assert!(config.validate().is_err());

        let dotted = TomlConfig {
            document_extension: ".pdf".to_string(),
            ..TomlConfig::default()
        };
        assert!(dotted.validate().is_ok());
    }

    #[test]
    fn test_default_root_folder_not_empty() {
        assert!(!default_root_folder().as_os_str().is_empty());
    }
}
