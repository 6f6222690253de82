//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use driveaudio_core::TracingOutputFormat;

/// driveaudio - Mirror the audio files of a Google Drive folder tree
#[derive(Debug, Parser)]
#[command(name = "driveaudio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Identity of the Drive folder to download
    pub folder_id: String,

    /// Local directory the folder tree is recreated under
    #[arg(long, short, default_value = ".")]
    pub destination: PathBuf,

    /// Path to configuration file
    #[arg(long, short, env = "DRIVEAUDIO_CONFIG")]
    pub config: Option<PathBuf>,

    // --- Credential files ---
    /// OAuth client-secret file, needed only for a fresh login
    #[arg(long, env = "DRIVEAUDIO_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Token file read on startup and written after login or refresh
    #[arg(long, env = "DRIVEAUDIO_TOKEN")]
    pub token: Option<PathBuf>,

    // --- Download tuning ---
    /// Number of concurrent downloads (defaults to the CPU count)
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    // --- Logging ---
    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "compact")]
    pub log_format: TracingOutputFormat,
}
