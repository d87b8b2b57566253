//! Service configuration resolution for kino-catalog
//!
//! Each value resolves CLI → environment → TOML → default. Clap handles
//! the first two tiers for the bind address and images url; the root folder
//! goes through `kino_common::config::resolve_root_folder`.

use std::path::{Path, PathBuf};

use kino_common::config::{ensure_root_folder, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use kino_common::Result;
use tracing::info;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Resolved startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub bind_address: String,
    /// Remote images service; `None` uses the local images table
    pub images_service_url: Option<String>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Resolve configuration and create the root folder if missing
    pub fn resolve(
        cli_root: Option<&Path>,
        cli_bind: Option<&str>,
        cli_images_url: Option<&str>,
        toml_config: &TomlConfig,
    ) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root, ROOT_FOLDER_ENV, Some(toml_config));
        let database_path = ensure_root_folder(&root_folder)?;

        let bind_address = cli_bind
            .map(str::to_string)
            .or_else(|| toml_config.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let images_service_url = cli_images_url
            .map(str::to_string)
            .or_else(|| toml_config.images_service_url.clone())
            .filter(|url| !url.trim().is_empty());

        info!("Root folder: {}", root_folder.display());
        info!("Database: {}", database_path.display());

        Ok(Self {
            root_folder,
            database_path,
            bind_address,
            images_service_url,
            log_level: toml_config.logging.level.clone(),
        })
    }

    /// Default tracing filter when RUST_LOG is unset
    pub fn default_log_filter(&self) -> String {
        format!(
            "kino_catalog={level},kino_common={level},tower_http=info",
            level = self.log_level
        )
    }
}
