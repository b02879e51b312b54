//! Configuration
//!
//! Layered with the `config` crate, lowest precedence first: built-in
//! defaults, `<workspace>/foldsync.toml`, then `FOLDSYNC__*` environment
//! variables (`__` separates nested keys, e.g.
//! `FOLDSYNC__ENGINE__MAX_COMMIT_ATTEMPTS=5`).

pub mod facade;
pub mod merge;
pub mod sources;
pub mod workspace;

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

pub use facade::ConfigLoader;
pub use workspace::storage_paths::StorageConfig;

/// Name of the optional per-workspace configuration file
pub const WORKSPACE_CONFIG_FILE: &str = "foldsync.toml";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "FOLDSYNC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldsyncConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_max_commit_attempts() -> usize {
    3
}

fn default_conflict_resolver() -> String {
    "simple".to_string()
}

/// Synchronization engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Runs of a read-modify-commit cycle before giving up on a moving branch
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: usize,

    /// Conflict resolver name
    #[serde(default = "default_conflict_resolver")]
    pub conflict_resolver: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
            conflict_resolver: default_conflict_resolver(),
        }
    }
}
