//! framecut
//!
//! A command-line tool that turns a local video, a direct media link or a
//! social/video page link into one image per second or into fixed-length
//! clips, and saves the results locally or to Google Drive.
//!
//! # Usage
//!
//! ```bash
//! framecut run --input talk.mp4 --mode frames --out-dir ./frames
//! framecut run --url https://youtube.com/watch?v=... --mode segments --segment-seconds 5 --download
//! framecut config set-credentials --client-id ... --api-key ...
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use framecut::adapters::{TomlConfigStore, TracingObserver};
use framecut::app::AppContainer;
use framecut::cli::{commands, Cli, Commands, TerminalObserver};
use framecut::config_initialization::initialize_configuration_hierarchy;
use framecut::ports::SessionObserver;
use framecut::utils::logging::{init_tracing, LogFormat};

/// Main entry point for the framecut CLI
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    info!("Starting framecut");

    let store = TomlConfigStore::at(cli.config.clone());
    let overrides = cli.overrides();

    let observer: Arc<dyn SessionObserver> = match cli.log_format {
        LogFormat::Json => Arc::new(TracingObserver::default()),
        LogFormat::Pretty => Arc::new(TerminalObserver),
    };

    let build = || -> Result<AppContainer> {
        let config = initialize_configuration_hierarchy(&store, &overrides)?;
        Ok(AppContainer::new(config)?)
    };

    match cli.command {
        Commands::Config(command) => commands::config(&store, &overrides, command)?,
        Commands::Run(args) => commands::run(&build()?, args, observer).await?,
        Commands::Fetch(args) => commands::fetch(&build()?, args, observer).await?,
        Commands::PickFolder(args) => commands::pick_folder(&build()?, args).await?,
    }

    info!("framecut completed successfully");
    Ok(())
}
