//! Built-in defaults every load starts from.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// A builder seeded with the engine defaults.
///
/// The remaining defaults come from the serde attributes on the config types.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("engine.max_commit_attempts", 3)?
        .set_default("engine.conflict_resolver", "simple")
}
