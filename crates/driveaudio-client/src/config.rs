//! Client configuration.
//!
//! Settings live in an optional `config.toml`, by default at
//! `~/.config/driveaudio/config.toml`. Every section and key may be omitted.
//!
//! ```toml
//! [google]
//! credentials_file = "credentials.json"
//! token_file = "token.json"
//! timeout_secs = 30
//!
//! [download]
//! workers = 8
//! chunk_size = 104857600
//!
//! [retry]
//! max_attempts = 5
//! delay_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use driveaudio_drive::RetryPolicy;
use driveaudio_drive::google::DriveConfig;

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Configuration for the driveaudio client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google credential and API settings.
    pub google: GoogleSettings,

    /// Download pool settings.
    pub download: DownloadSettings,

    /// Retry settings for listing and metadata calls.
    pub retry: RetrySettings,
}

/// Google credential and API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client-secret file.
    pub credentials_file: PathBuf,

    /// Persisted token file.
    pub token_file: PathBuf,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from(DriveConfig::DEFAULT_CLIENT_SECRET_FILE),
            token_file: PathBuf::from(DriveConfig::DEFAULT_TOKEN_FILE),
            timeout_secs: DriveConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Download pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Concurrent downloads. `None` means one per CPU.
    pub workers: Option<usize>,

    /// Bytes requested per ranged media call.
    pub chunk_size: u64,
}

impl DownloadSettings {
    /// 100 MiB per ranged request.
    pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

    /// Returns the pool size, falling back to the available parallelism.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Retry settings for listing and metadata calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per call.
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            delay_ms: RetryPolicy::DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Loads the file named on the command line, else the default file if
    /// it exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> ClientResult<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Loads configuration from the default path.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("driveaudio")
            .join("config.toml")
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref path) = cli.credentials {
            self.google.credentials_file = path.clone();
        }
        if let Some(ref path) = cli.token {
            self.google.token_file = path.clone();
        }
        if let Some(workers) = cli.workers {
            self.download.workers = Some(workers);
        }
    }

    /// Checks values that would make the run misbehave.
    pub fn validate(&self) -> ClientResult<()> {
        if self.download.workers == Some(0) {
            return Err(ClientError::Config("workers must be at least 1".to_string()));
        }
        if self.download.chunk_size == 0 {
            return Err(ClientError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ClientError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        self.drive_config().validate().map_err(ClientError::Config)
    }

    /// Builds the Drive access configuration.
    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig::default()
            .with_client_secret_path(&self.google.credentials_file)
            .with_token_path(&self.google.token_file)
            .with_timeout(Duration::from_secs(self.google.timeout_secs))
    }

    /// Builds the retry policy for listing and metadata calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }
}
