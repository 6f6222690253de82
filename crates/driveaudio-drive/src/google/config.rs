//! Google Drive access configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials from a Google Cloud Console project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
}

/// Layout of a client-secret JSON file.
///
/// Google Cloud Console downloads nest the values under `installed` or
/// `web`; gcloud-style files keep them at the root.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads OAuth credentials from a client-secret JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses OAuth credentials from a client-secret JSON string.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        match (file.client_id, file.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self::new(client_id, client_secret)),
            _ => Err(ProviderError::configuration(
                "client secret file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
            )),
        }
    }

    /// Checks that both values are present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Configuration for talking to Google Drive.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Path to the OAuth client-secret file, read only for interactive login.
    pub client_secret_path: PathBuf,

    /// Path of the persisted token file.
    pub token_path: PathBuf,

    /// Request timeout for API and OAuth calls.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,
}

impl DriveConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only Drive scope.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/drive.readonly";

    /// Default client-secret file name, relative to the working directory.
    pub const DEFAULT_CLIENT_SECRET_FILE: &'static str = "credentials.json";

    /// Default token file name, relative to the working directory.
    pub const DEFAULT_TOKEN_FILE: &'static str = "token.json";

    /// Sets the client-secret path.
    pub fn with_client_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret_path = path.into();
        self
    }

    /// Sets the token storage path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.token_path.as_os_str().is_empty() {
            return Err("token path must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from(Self::DEFAULT_CLIENT_SECRET_FILE),
            token_path: PathBuf::from(Self::DEFAULT_TOKEN_FILE),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("driveaudio/{}", env!("CARGO_PKG_VERSION")),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }
}
