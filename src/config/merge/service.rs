//! MergeService: orchestrates sources, applies merge policy, deserializes to FoldsyncConfig.

use super::merge_policy;
use crate::config::sources::{environment, workspace_file};
use crate::config::FoldsyncConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<FoldsyncConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        config.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<FoldsyncConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path));
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
