//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "KINO_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "kino.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    /// Address the catalog server binds, e.g. "127.0.0.1:5780"
    pub bind_address: Option<String>,
    /// Base URL of a remote Images service; local image table when unset
    pub images_service_url: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = toml_config.and_then(|c| c.root_folder.as_ref()) {
        return root_folder.clone();
    }

    default_root_folder()
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/kino/config.toml` first, then `/etc/kino/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("kino").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/kino/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the platform config file, or defaults when none exists
///
/// A config file that exists but fails to parse is an error; silently
/// ignoring it would hide a misconfiguration.
pub fn load_default_toml_config() -> Result<TomlConfig> {
    match find_config_file() {
        Some(path) => {
            tracing::debug!("Loading config file: {}", path.display());
            load_toml_config(&path)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/kino (or /var/lib/kino for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("kino"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/kino"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("kino"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/kino"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("kino"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\kino"))
    } else {
        PathBuf::from("./kino_data")
    }
}
