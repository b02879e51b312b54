//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::FoldsyncConfig;
use crate::error::SyncError;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace from its file and the environment.
    pub fn load(workspace_root: &Path) -> Result<FoldsyncConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<FoldsyncConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Write a configuration as TOML, creating parent directories.
    pub fn save(config: &FoldsyncConfig, path: &Path) -> Result<(), SyncError> {
        let text = toml::to_string_pretty(config)
            .map_err(|e| SyncError::Config(format!("Failed to encode configuration: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}
