//! CLI module for framecut
//!
//! This module handles command-line argument parsing and command execution.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::ConfigOverrides;
use crate::domain::model::{LogKind, LogMessage, SessionState};
use crate::ports::SessionObserver;
use crate::utils::logging::LogFormat;

pub mod args;
pub mod commands;

/// framecut
///
/// Turns a local video or a video link into one image per second or into
/// fixed-length clips, saved to a folder, the Downloads folder or Google Drive.
#[derive(Parser)]
#[command(name = "framecut")]
#[command(about = "framecut - frames and segments from any video")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Log output format: pretty or json
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Configuration file
    #[arg(long, env = "FRAMECUT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<String>,

    /// Threads handed to ffmpeg
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Social link extraction endpoint
    #[arg(long, global = true)]
    pub extractor_endpoint: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ffmpeg_path: self.ffmpeg.clone(),
            threads: self.threads,
            extractor_endpoint: self.extractor_endpoint.clone(),
        }
    }
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Extract frames or cut segments and save the results
    Run(args::RunArgs),
    /// Download a linked video to a local file
    Fetch(args::FetchArgs),
    /// Choose a Google Drive folder and print its id
    PickFolder(args::PickFolderArgs),
    /// Show or edit the configuration
    #[command(subcommand)]
    Config(args::ConfigCommand),
}

/// Renders session events on stderr
pub struct TerminalObserver;

impl SessionObserver for TerminalObserver {
    // state changes are narrated by the session log
    fn on_state(&self, _state: SessionState) {}

    fn on_progress(&self, percent: u8) {
        if percent == 0 {
            return;
        }
        let filled = usize::from(percent) / 5;
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r[{}{}] {:>3}%",
            "#".repeat(filled),
            " ".repeat(20 - filled),
            percent
        );
        if percent == 100 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }

    fn on_log(&self, message: &LogMessage) {
        let marker = match message.kind {
            LogKind::Info => "·",
            LogKind::Success => "✓",
            LogKind::Warning => "!",
            LogKind::Error => "✗",
        };
        eprintln!("{} {}", marker, message.text);
    }
}
