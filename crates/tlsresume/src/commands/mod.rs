//! CLI command handlers.

use std::path::PathBuf;

use tlsresume_config::LoadedConfig;

pub mod config;
pub mod inspect;
pub mod simulate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
    /// Config discovered at startup.
    pub loaded: LoadedConfig,
}
