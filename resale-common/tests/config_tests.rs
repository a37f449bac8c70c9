//! Tests for configuration and graceful degradation
//!
//! - Missing TOML files never cause termination
//! - Priority order for root folder resolution
//! - Automatic directory creation
//!
//! Tests that manipulate RESALE_ROOT_FOLDER or RESALE_ROOT are marked with
//! #[serial] so they never race on the process environment.

use resale_common::config::{
    CompiledDefaults, LoggingConfig, RootFolderInitializer, RootFolderResolver, ServerConfig,
    TomlConfig,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert_eq!(defaults.bind, "127.0.0.1:5740");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var("RESALE_ROOT_FOLDER");
    env::remove_var("RESALE_ROOT");

    let resolver = RootFolderResolver::new("nonexistent-test-module-12345");
    let root_folder = resolver.resolve();

    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(root_folder, defaults.root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    env::remove_var("RESALE_ROOT");
    env::set_var("RESALE_ROOT_FOLDER", "/tmp/resale-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/resale-test-env-folder"));

    env::remove_var("RESALE_ROOT_FOLDER");
}

#[test]
#[serial]
fn test_resolver_root_folder_takes_precedence_over_root() {
    env::set_var("RESALE_ROOT_FOLDER", "/tmp/resale-priority-1");
    env::set_var("RESALE_ROOT", "/tmp/resale-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/resale-priority-1"));

    env::remove_var("RESALE_ROOT_FOLDER");
    env::remove_var("RESALE_ROOT");
}

#[test]
#[serial]
fn test_cli_override_beats_environment() {
    env::set_var("RESALE_ROOT_FOLDER", "/tmp/resale-from-env");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_override(Some(PathBuf::from("/tmp/resale-from-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/resale-from-cli"));

    env::remove_var("RESALE_ROOT_FOLDER");
}

#[test]
fn test_initializer_database_path() {
    let root = PathBuf::from("/tmp/resale-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("resale.db"));
}

#[test]
fn test_initializer_creates_nested_directory_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("level1").join("level2");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
    assert!(!initializer.database_path().exists());
}

#[test]
fn test_toml_roundtrip() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/resale")),
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
        server: ServerConfig {
            bind: Some("0.0.0.0:8080".to_string()),
        },
    };

    let toml_str = toml::to_string(&config).unwrap();
    let parsed: TomlConfig = toml::from_str(&toml_str).unwrap();

    assert_eq!(parsed, config);
}

#[test]
fn test_malformed_toml_file_reports_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    let result = TomlConfig::load(&path);
    assert!(matches!(result, Err(resale_common::Error::Config(_))));
}
