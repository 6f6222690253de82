//! Persisted OAuth token.
//!
//! The token file uses Google's "authorized user" layout, so it carries the
//! client id and secret needed to refresh without the client-secret file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// A token is treated as expired this long before its real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// An access/refresh token pair plus what is needed to refresh it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    #[serde(rename = "token")]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshes.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// OAuth client id the token was issued to.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret the token was issued to.
    #[serde(default)]
    pub client_secret: String,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token expires. `None` means it does not expire.
    #[serde(default, rename = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        client: &OAuthCredentials,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_uri: default_token_uri(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            scopes,
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Returns true if the token can be used as-is.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Returns true if the token can be refreshed without user interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if the token was granted every required scope.
    ///
    /// Tokens written without a scope list are accepted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        self.scopes.is_empty() || required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns the OAuth client this token belongs to.
    pub fn client(&self) -> OAuthCredentials {
        OAuthCredentials::new(&self.client_id, &self.client_secret)
    }

    /// Applies a refresh response.
    ///
    /// Google only sometimes rotates the refresh token; the old one is kept
    /// when the response omits it.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
    }
}

/// File-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a token store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the persisted token.
    ///
    /// A missing file is `Ok(None)`. An unreadable or malformed file is
    /// logged and also treated as absent, so the caller falls back to a
    /// fresh login that overwrites it.
    pub fn load(&self) -> ProviderResult<Option<Credential>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(None);
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read token file: {}", e);
                return Ok(None);
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                debug!(path = %self.path.display(), "loaded token");
                Ok(Some(credential))
            }
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring malformed token file: {}", e);
                Ok(None)
            }
        }
    }

    /// Writes the token, replacing any previous content.
    pub fn save(&self, credential: &Credential) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        // temp file + rename so a crash never leaves half a token behind
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        info!(path = %self.path.display(), "saved token");
        Ok(())
    }

    /// Returns the token storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client() -> OAuthCredentials {
        OAuthCredentials::new("id.apps.googleusercontent.com", "secret")
    }

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/drive.readonly".to_string()]
    }

    #[test]
    fn credential_creation() {
        let cred = Credential::new("access", Some("refresh".into()), Some(3600), &client(), scopes());

        assert_eq!(cred.access_token, "access");
        assert_eq!(cred.client_id, "id.apps.googleusercontent.com");
        assert_eq!(cred.token_uri, GOOGLE_TOKEN_URL);
        assert!(cred.is_valid());
        assert!(cred.can_refresh());
    }

    #[test]
    fn credential_expired() {
        let mut cred = Credential::new("access", None, Some(3600), &client(), scopes());
        cred.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(cred.is_expired());
        assert!(!cred.is_valid());
        assert!(!cred.can_refresh());
    }

    #[test]
    fn credential_inside_skew_is_expired() {
        let cred = Credential::new("access", None, Some(30), &client(), scopes());
        assert!(cred.is_expired());
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let cred = Credential::new("access", None, None, &client(), vec![]);
        assert!(!cred.is_expired());
    }

    #[test]
    fn apply_refresh_keeps_old_refresh_token() {
        let mut cred = Credential::new("old", Some("r1".into()), Some(-10), &client(), scopes());
        cred.apply_refresh("new", Some(3600), None);
        assert_eq!(cred.access_token, "new");
        assert_eq!(cred.refresh_token.as_deref(), Some("r1"));
        assert!(cred.is_valid());

        cred.apply_refresh("newer", Some(3600), Some("r2".into()));
        assert_eq!(cred.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn scope_check() {
        let cred = Credential::new("a", None, None, &client(), scopes());
        assert!(cred.has_scopes(&scopes()));
        assert!(!cred.has_scopes(&["https://www.googleapis.com/auth/drive".to_string()]));
    }

    #[test]
    fn parses_authorized_user_layout() {
        let json = r#"{
            "token": "ya29.access",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/drive.readonly"],
            "expiry": "2099-01-01T00:00:00.000000Z"
        }"#;

        let cred: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.access_token, "ya29.access");
        assert_eq!(cred.refresh_token.as_deref(), Some("1//refresh"));
        assert!(cred.is_valid());
    }

    #[test]
    fn store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let cred = Credential::new("access", Some("refresh".into()), Some(3600), &client(), scopes());
        store.save(&cred).unwrap();
        assert!(store.path().exists());

        let loaded = TokenStore::new(store.path()).load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn store_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store
            .save(&Credential::new("first", None, None, &client(), scopes()))
            .unwrap();
        store
            .save(&Credential::new("second", None, None, &client(), scopes()))
            .unwrap();

        assert_eq!(store.load().unwrap().unwrap().access_token, "second");
    }

    #[test]
    fn store_no_file() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn store_malformed_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(TokenStore::new(path).load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store
            .save(&Credential::new("a", None, None, &client(), vec![]))
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
