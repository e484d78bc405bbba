//! Command implementations

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::adapters::TomlConfigStore;
use crate::app::AppContainer;
use crate::cli::args::{ConfigCommand, CredentialArgs, FetchArgs, PickFolderArgs, RunArgs};
use crate::config_initialization::{initialize_configuration_hierarchy, ConfigOverrides};
use crate::domain::model::{MediaFile, MediaSource};
use crate::output::{DownloadsFolderHost, GoogleConfig, LocalDirectory, OutputSink, PromptFolderPicker};
use crate::ports::{FolderPicker, PickOutcome, SessionObserver};

/// Execute the run command
pub async fn run(
    container: &AppContainer,
    args: RunArgs,
    observer: Arc<dyn SessionObserver>,
) -> Result<()> {
    info!("Starting run");

    let sink = resolve_sink(container, &args).await?;
    let source = match (&args.input, &args.url) {
        (Some(path), _) => MediaSource::File(
            MediaFile::from_path(path)
                .await
                .with_context(|| format!("Failed to read input file {}", path.display()))?,
        ),
        (None, Some(url)) => MediaSource::Url(url.clone()),
        (None, None) => bail!("either --input or --url is required"),
    };

    let mut session = container.session(
        args.access_token.clone(),
        Arc::new(DownloadsFolderHost::user_default()),
        observer,
    );
    session.set_source(source);
    session.set_mode(args.processing_mode());
    if let Some(sink) = sink {
        session.set_sink(sink);
    }

    let summary = session.run().await.context("Run failed")?;
    info!(
        produced = summary.produced,
        dispatched = summary.dispatched,
        failed = summary.failed,
        "Run completed"
    );

    if summary.failed > 0 {
        bail!(
            "{} of {} file(s) could not be saved",
            summary.failed,
            summary.produced
        );
    }
    Ok(())
}

async fn resolve_sink(container: &AppContainer, args: &RunArgs) -> Result<Option<OutputSink>> {
    if let Some(dir) = &args.out_dir {
        let directory = LocalDirectory::open(dir)?;
        return Ok(Some(OutputSink::LocalDirectory(directory)));
    }
    if args.download {
        return Ok(Some(OutputSink::ForcedDownload));
    }
    if let Some(folder_id) = &args.drive_folder {
        return Ok(Some(OutputSink::RemoteFolder {
            folder_id: folder_id.clone(),
        }));
    }
    if args.pick_folder {
        let access = container.drive_access(args.access_token.clone())?;
        let picker = PromptFolderPicker::stdin(access);
        return match picker.pick_folder().await? {
            PickOutcome::Picked(folder) => Ok(Some(OutputSink::RemoteFolder { folder_id: folder.id })),
            PickOutcome::Cancelled => bail!("folder selection cancelled"),
        };
    }
    Ok(None)
}

/// Execute the fetch command
pub async fn fetch(
    container: &AppContainer,
    args: FetchArgs,
    observer: Arc<dyn SessionObserver>,
) -> Result<()> {
    info!("Starting fetch");
    let directory = LocalDirectory::open(&args.out_dir)?;

    let mut session = container.session(
        None,
        Arc::new(DownloadsFolderHost::user_default()),
        observer,
    );
    session.set_source(MediaSource::Url(args.url));
    session.resolve_input().await.context("Download failed")?;

    let Some(MediaSource::File(file)) = session.source() else {
        bail!("link did not resolve to a file");
    };
    let target = directory.path().join(&file.name);
    tokio::fs::write(&target, &file.binary)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("{}", target.display());
    Ok(())
}

/// Execute the pick-folder command
pub async fn pick_folder(container: &AppContainer, args: PickFolderArgs) -> Result<()> {
    let access = container.drive_access(args.access_token)?;
    match PromptFolderPicker::stdin(access).pick_folder().await? {
        PickOutcome::Picked(folder) => println!("{}\t{}", folder.id, folder.name),
        PickOutcome::Cancelled => eprintln!("Cancelled"),
    }
    Ok(())
}

/// Execute a config subcommand
pub fn config(store: &TomlConfigStore, overrides: &ConfigOverrides, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let effective = initialize_configuration_hierarchy(store, overrides)?;
            println!("# {}", store.path().display());
            print!("{}", effective.redacted().to_toml()?);
            if let Err(e) = effective.google.validate() {
                eprintln!("note: Google Drive uploads unavailable: {}", e);
            }
        }
        ConfigCommand::SetCredentials(args) => set_credentials(store, args)?,
    }
    Ok(())
}

fn set_credentials(store: &TomlConfigStore, args: CredentialArgs) -> Result<()> {
    let candidate = GoogleConfig {
        client_id: args.client_id.trim().to_string(),
        api_key: args.api_key.trim().to_string(),
        app_id: args.app_id.unwrap_or_default().trim().to_string(),
        ..GoogleConfig::default()
    };
    candidate.validate()?;

    let mut config = store.load()?.unwrap_or_default();
    config.google.client_id = candidate.client_id;
    config.google.api_key = candidate.api_key;
    config.google.app_id = candidate.app_id;
    store.save(&config)?;

    println!("Credentials saved to {}", store.path().display());
    Ok(())
}
