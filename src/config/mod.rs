//! Configuration
//!
//! Layered configuration: built-in defaults, then the global file, then a
//! `partmirror.toml` next to the container, then `PARTMIRROR__*` environment
//! variables.

mod facade;
mod merge;
pub mod sources;
pub mod xdg;

pub use facade::ConfigLoader;

use crate::cache::{CacheStore, RenderOptions, DEFAULT_FORMAT_LIMIT};
use crate::logging::LoggingConfig;
use crate::watch::WatchConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// File name of the container-local config file
pub const LOCAL_CONFIG_FILE: &str = "partmirror.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartMirrorConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PartMirrorConfig {
    /// Reject values that would put the cache somewhere unsafe.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;
        if self.watch.batch_window_ms == 0 {
            return Err("watch.batch_window_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn default_dir_name() -> String {
    ".partmirror".to_string()
}

fn default_format_limit() -> usize {
    DEFAULT_FORMAT_LIMIT
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Cache directory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name of the cache directory created next to the container
    #[serde(default = "default_dir_name")]
    pub dir_name: String,

    /// XML longer than this many characters is cached unformatted
    #[serde(default = "default_format_limit")]
    pub format_limit: usize,

    /// Spaces per nesting level when formatting XML
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Mark the cache directory hidden where the platform has such an attribute
    #[serde(default = "default_true")]
    pub hide_root: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir_name: default_dir_name(),
            format_limit: default_format_limit(),
            indent: default_indent(),
            hide_root: default_true(),
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), String> {
        let name = self.dir_name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', ':']) {
            return Err(format!(
                "cache.dir_name must be a single directory name, got {:?}",
                self.dir_name
            ));
        }
        Ok(())
    }

    /// Shared cache directory: `dir_name` inside the container's directory.
    pub fn base_for(&self, container: &Path) -> PathBuf {
        container
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.dir_name)
    }

    /// Cache root for one container, named after its file so containers
    /// sharing a directory never share a cache.
    pub fn root_for(&self, container: &Path) -> PathBuf {
        let name = container
            .file_name()
            .unwrap_or_else(|| OsStr::new("container"));
        self.base_for(container).join(name)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format_limit: self.format_limit,
            indent: self.indent,
        }
    }

    pub fn store_for(&self, container: &Path) -> CacheStore {
        CacheStore::new(self.root_for(container), self.render_options())
            .with_base_dir(self.base_for(container))
            .with_hidden_root(self.hide_root)
    }
}
