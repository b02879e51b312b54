//! `FOLDSYNC__*` environment overlay

use crate::config::ENV_PREFIX;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment};

/// Overlay environment variables; `__` separates nested keys and empty values
/// leave the lower layers untouched.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true),
    ))
}
