//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use tlsresume_config::{self, PROJECT_CONFIG_FILE, TlsResumeConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective client and server cache settings
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./tlsresume.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Which => cmd_which(ctx).await,
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force).await,
        ConfigCommand::Path => cmd_path(ctx).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    let client = config.client_cache().context("invalid [client] section")?;
    let server = config.server_cache().context("invalid [server] section")?;

    if ctx.json_output {
        let value = serde_json::json!({
            "client": {
                "cache_size": client.capacity,
                "timeout_secs": client.timeout_secs(),
                "persist_dir": config.client.as_ref().and_then(|c| c.persist_dir.clone()),
            },
            "server": {
                "cache_size": server.capacity,
                "timeout_secs": server.timeout_secs(),
            },
            "sources": ctx.loaded.loaded_from(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("# tlsresume Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    for cache in [&client, &server] {
        println!("{}:", cache.label);
        println!("  cache_size:   {}", cache.capacity);
        match cache.timeout_secs() {
            0 => println!("  timeout_secs: 0 (never expire)"),
            secs => println!("  timeout_secs: {secs}"),
        }
    }
    if let Some(dir) = config.client.as_ref().and_then(|c| c.persist_dir.as_ref()) {
        println!("  persist_dir:  {}", dir.display());
    }
    println!();

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

async fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = ctx.loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'tlsresume config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

async fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        user_config_path(ctx)?
    };

    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    tlsresume_config::save_config(&TlsResumeConfig::with_defaults(), &path)?;
    println!("✓ Created config file: {}", path.display());

    Ok(())
}

async fn cmd_path(ctx: &Context) -> Result<()> {
    println!("{}", user_config_path(ctx)?.display());
    Ok(())
}

fn user_config_path(ctx: &Context) -> Result<PathBuf> {
    tlsresume_config::user_config_path(ctx.config_dir.as_deref())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}
