//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `RESALE_ROOT_FOLDER`, then `RESALE_ROOT` environment variable
//! 3. TOML config file (`~/.config/resale/<module>.toml`, then `/etc/resale/<module>.toml`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed TOML file never aborts startup: a warning is logged
//! and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable checked first for the root folder
pub const ROOT_FOLDER_ENV: &str = "RESALE_ROOT_FOLDER";
/// Alternative environment variable for the root folder
pub const ROOT_ENV: &str = "RESALE_ROOT";
/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "resale.db";

/// Compiled fallback values used when no other source provides one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub bind: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
            bind: "127.0.0.1:5740".to_string(),
        }
    }
}

/// `[logging]` section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[server]` section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub bind: Option<String>,
}

/// Per-module TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }
}

/// Resolves the root folder (database location) for a module
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
        }
    }

    /// Set the command-line override (priority 1)
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_override {
            info!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    info!("Root folder from {}: {}", var, path);
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(root) = self.load_toml().and_then(|c| c.root_folder) {
            info!("Root folder from config file: {}", root.display());
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }

    /// Load this module's TOML config, if one exists and parses
    pub fn load_toml(&self) -> Option<TomlConfig> {
        let path = self.config_file_path()?;
        match TomlConfig::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn config_file_path(&self) -> Option<PathBuf> {
        let file_name = format!("{}.toml", self.module_name);
        let user_config = dirs::config_dir().map(|d| d.join("resale").join(&file_name));
        let system_config = PathBuf::from("/etc/resale").join(&file_name);

        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }
        if cfg!(unix) && system_config.exists() {
            return Some(system_config);
        }
        None
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/resale (or /var/lib/resale for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("resale"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/resale"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("resale"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/resale"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("resale"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\resale"))
    } else {
        PathBuf::from("./resale_data")
    }
}
