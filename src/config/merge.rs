//! MergeService: orchestrates sources, applies merge policy, deserializes to PartMirrorConfig.

use super::sources;
use super::PartMirrorConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config for a container living in `container_dir`.
    /// Precedence: defaults (lowest) -> global file -> container-local file -> environment (highest).
    pub fn load(container_dir: &Path) -> Result<PartMirrorConfig, ConfigError> {
        let builder = Config::builder();
        let builder = sources::global_file::add_to_builder(builder);
        let builder = sources::local_file::add_to_builder(builder, container_dir);
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<PartMirrorConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = Config::builder().add_source(config::File::from(path));
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    pub(crate) fn finish(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<PartMirrorConfig, ConfigError> {
        let config: PartMirrorConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(ConfigError::Message)?;
        debug!(cache_dir = %config.cache.dir_name, "Loaded configuration");
        Ok(config)
    }
}
