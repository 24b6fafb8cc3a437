//! ConfigLoader facade delegating to merge service.

use super::merge::MergeService;
use super::PartMirrorConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the container at `container`.
    pub fn load(container: &Path) -> Result<PartMirrorConfig, ConfigError> {
        let dir = container.parent().unwrap_or_else(|| Path::new(""));
        MergeService::load(dir)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<PartMirrorConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Create default configuration.
    pub fn default() -> PartMirrorConfig {
        PartMirrorConfig::default()
    }
}
