//! Command-line argument definitions

use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::domain::model::ProcessingMode;

/// What the run should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One PNG image per second of video
    Frames,
    /// Stream-copied MP4 segments
    Segments,
}

/// Arguments for the run command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "url"])))]
#[command(group(ArgGroup::new("destination").args(["out_dir", "download", "drive_folder", "pick_folder"])))]
pub struct RunArgs {
    /// Local video file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Link to a video (direct media or a social/video page)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Processing mode
    #[arg(short, long, value_enum, default_value = "frames")]
    pub mode: ModeArg,

    /// Segment length in seconds (segments mode)
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub segment_seconds: i64,

    /// Save results into this directory
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Save results into the Downloads folder
    #[arg(long)]
    pub download: bool,

    /// Upload results into this Google Drive folder id
    #[arg(long)]
    pub drive_folder: Option<String>,

    /// Choose the Google Drive folder interactively
    #[arg(long)]
    pub pick_folder: bool,

    /// Google Drive OAuth access token
    #[arg(long, env = "FRAMECUT_DRIVE_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

impl RunArgs {
    pub fn processing_mode(&self) -> ProcessingMode {
        match self.mode {
            ModeArg::Frames => ProcessingMode::ExtractFrames,
            ModeArg::Segments => ProcessingMode::CutSegments {
                segment_seconds: self.segment_seconds,
            },
        }
    }
}

/// Arguments for the fetch command
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Link to resolve
    pub url: String,

    /// Directory to store the downloaded video in
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Arguments for the pick-folder command
#[derive(Args, Debug)]
pub struct PickFolderArgs {
    /// Google Drive OAuth access token
    #[arg(long, env = "FRAMECUT_DRIVE_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,
    /// Save Google credentials to the configuration file
    SetCredentials(CredentialArgs),
}

/// Arguments for config set-credentials
#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// OAuth client id
    #[arg(long)]
    pub client_id: String,

    /// API key
    #[arg(long)]
    pub api_key: String,

    /// Project number, optional
    #[arg(long)]
    pub app_id: Option<String>,
}
