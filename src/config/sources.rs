//! Config sources, one module per layer.

pub mod global_file {
    //! Global config file: `$XDG_CONFIG_HOME/partmirror/config.toml`

    use crate::config::xdg;
    use config::builder::DefaultState;
    use config::{ConfigBuilder, File};

    pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        match xdg::global_config_path() {
            Some(path) => builder.add_source(File::from(path).required(false)),
            None => builder,
        }
    }
}

pub mod local_file {
    //! Container-local config file: `partmirror.toml` next to the container

    use crate::config::LOCAL_CONFIG_FILE;
    use config::builder::DefaultState;
    use config::{ConfigBuilder, File};
    use std::path::Path;

    pub fn add_to_builder(
        builder: ConfigBuilder<DefaultState>,
        container_dir: &Path,
    ) -> ConfigBuilder<DefaultState> {
        builder.add_source(File::from(container_dir.join(LOCAL_CONFIG_FILE)).required(false))
    }
}

pub mod environment {
    //! Environment variable source: PARTMIRROR__ prefix with __ separator

    use config::builder::DefaultState;
    use config::{ConfigBuilder, Environment};

    /// `PARTMIRROR__CACHE__INDENT=4` sets `cache.indent`.
    pub fn source() -> Environment {
        Environment::with_prefix("PARTMIRROR")
            .separator("__")
            .try_parsing(true)
    }

    pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(source())
    }
}
