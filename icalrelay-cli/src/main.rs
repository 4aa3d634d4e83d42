mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use icalrelay_core::{ConfigStore, RelayConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "icalrelay")]
#[command(about = "Relay calendar feeds through filtering and editing modules")]
struct Cli {
    /// Configuration file (default: ~/.config/icalrelay/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a profile and print the resulting calendar
    Render {
        profile: String,

        /// Write the calendar to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the remaining modules after one fails
        #[arg(long)]
        keep_going: bool,
    },
    /// Validate every profile's modules
    Check,
    /// List the available modules
    Modules,
    /// List configured profiles
    Profiles,
    /// Remove expired modules from all profiles
    Cleanup {
        /// Keep running and clean up on the configured interval
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter_layer, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Modules = cli.command {
        return commands::modules::run();
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => RelayConfig::default_path()?,
    };
    let store = Arc::new(
        ConfigStore::open(&config_path)
            .with_context(|| format!("Could not load {}", config_path.display()))?,
    );

    // RUST_LOG wins over the configured level
    if !from_env {
        let level = store.read(|c| c.server.log_level.clone()).await;
        match EnvFilter::try_new(&level) {
            Ok(filter) => {
                if let Err(e) = filter_handle.modify(|current| *current = filter) {
                    tracing::warn!(error = %e, "Failed to apply configured log level");
                }
            }
            Err(_) => tracing::warn!(%level, "Invalid log level in config, keeping info"),
        }
    }

    match cli.command {
        Commands::Render {
            profile,
            output,
            keep_going,
        } => commands::render::run(store, &profile, output.as_deref(), keep_going).await,
        Commands::Check => commands::check::run(store).await,
        Commands::Profiles => commands::profiles::run(store).await,
        Commands::Cleanup { watch } => commands::cleanup::run(store, watch).await,
        Commands::Modules => commands::modules::run(),
    }
}
