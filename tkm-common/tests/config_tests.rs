//! Configuration loading and root folder resolution tests
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TKM_TEST_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tkm_common::config::{default_root_folder, load_toml_config, RootFolderResolver, TomlConfig};
use tkm_common::Error;

const ENV_VAR: &str = "TKM_TEST_ROOT_FOLDER";

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.port, 3000);
    assert_eq!(config.retention_hours, 24);
}

#[test]
fn test_config_file_values_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/tickets"
port = 4100
retention_hours = 6
document_extension = "PDF"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/tickets")));
    assert_eq!(config.port, 4100);
    assert_eq!(config.retention_hours, 6);
    assert_eq!(config.document_extension, "PDF");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.sweep_interval_minutes, 60);
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    match load_toml_config(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse TOML failed")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_upload_mb = 0").unwrap();
    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ENV_VAR, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(ENV_VAR);
    let resolved = resolver.resolve(Some(Path::new("/tmp/from-cli")), &toml);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ENV_VAR, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(ENV_VAR);
    assert_eq!(resolver.resolve(None, &toml), PathBuf::from("/tmp/from-env"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(ENV_VAR);
    let resolver = RootFolderResolver::new(ENV_VAR);

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolver.resolve(None, &toml), PathBuf::from("/tmp/from-toml"));

    assert_eq!(
        resolver.resolve(None, &TomlConfig::default()),
        default_root_folder()
    );
}
