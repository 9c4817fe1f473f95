//! Configuration system for tlsresume.
//!
//! Provides TOML-based configuration with:
//! - Independent `[client]` and `[server]` session cache sections
//! - A `[logging]` section for the CLI's file log
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, user_config_path,
    xdg_config_dir, xdg_config_path, ConfigSource, LoadedConfig, PROJECT_CONFIG_FILE,
};
pub use error::{ConfigError, Result};
pub use types::*;
