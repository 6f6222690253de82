//! Obtaining a usable Drive credential.
//!
//! [`CredentialManager::obtain_credentials`] walks the same ladder every
//! run: persisted token, then refresh, then interactive login. Only the last
//! step needs the client-secret file.

use std::path::{Path, PathBuf};

use tokio::sync::RwLock as TokioRwLock;

use tracing::{debug, info, warn};

use crate::api::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::{DriveConfig, OAuthCredentials};
use super::tokens::{Credential, TokenStore};

/// Result of a refresh-token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new access token.
    pub access_token: String,
    /// Lifetime of the new token in seconds.
    pub expires_in: Option<i64>,
    /// A rotated refresh token, when Google issued one.
    pub refresh_token: Option<String>,
}

/// The OAuth operations the credential manager needs.
///
/// Implemented by [`OAuthClient`](super::OAuthClient) against Google's
/// endpoints.
pub trait AuthFlow: Send + Sync {
    /// Exchanges the credential's refresh token for a new access token.
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<RefreshedToken>>;

    /// Runs the interactive consent flow.
    fn authorize<'a>(
        &'a self,
        client: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, ProviderResult<Credential>>;
}

/// Supplies the bearer token for each Drive request.
pub trait AccessTokenSource: Send + Sync {
    /// Returns an access token that is valid now, refreshing it if needed.
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>>;
}

/// Exchanges the refresh token and writes the result back to `store`.
async fn refresh_and_save<F: AuthFlow>(
    flow: &F,
    store: &TokenStore,
    credential: &mut Credential,
) -> ProviderResult<()> {
    let refreshed = flow.refresh(credential).await?;
    credential.apply_refresh(
        refreshed.access_token,
        refreshed.expires_in,
        refreshed.refresh_token,
    );
    store.save(credential)
}

/// Loads, refreshes or creates the credential used for Drive calls.
pub struct CredentialManager<F> {
    store: TokenStore,
    client_secret_path: PathBuf,
    scopes: Vec<String>,
    flow: F,
}

impl<F: AuthFlow> CredentialManager<F> {
    /// Creates a manager for the token and client-secret paths in `config`.
    pub fn new(config: &DriveConfig, flow: F) -> Self {
        Self {
            store: TokenStore::new(&config.token_path),
            client_secret_path: config.client_secret_path.clone(),
            scopes: config.scopes.clone(),
            flow,
        }
    }

    /// Returns a credential that is valid right now.
    ///
    /// # Errors
    ///
    /// - `MissingClientSecret` if a login is needed and the client-secret
    ///   file does not exist. No login is attempted in that case.
    /// - Whatever the refresh or login flow reports.
    pub async fn obtain_credentials(&self) -> ProviderResult<Credential> {
        let stored = self.store.load()?.filter(|credential| {
            let usable = credential.has_scopes(&self.scopes);
            if !usable {
                warn!("stored token lacks the required scopes, logging in again");
            }
            usable
        });

        if let Some(mut credential) = stored {
            if credential.is_valid() {
                debug!("using stored token");
                return Ok(credential);
            }

            if credential.is_expired() && credential.can_refresh() {
                info!("stored token expired, refreshing");
                refresh_and_save(&self.flow, &self.store, &mut credential).await?;
                return Ok(credential);
            }
        }

        let client = self.load_client_secret()?;
        let credential = self.flow.authorize(&client, &self.scopes).await?;
        self.store.save(&credential)?;
        info!("authorization complete");
        Ok(credential)
    }

    fn load_client_secret(&self) -> ProviderResult<OAuthCredentials> {
        if !self.client_secret_path.exists() {
            return Err(ProviderError::missing_client_secret(format!(
                "No {} file found. Either change to the directory that holds it, \
                 or set up OAuth credentials for this machine at console.cloud.google.com",
                self.client_secret_path.display()
            )));
        }

        let client = OAuthCredentials::from_file(&self.client_secret_path)?;
        client.validate().map_err(|e| {
            ProviderError::configuration(format!(
                "invalid client secret file {}: {}",
                self.client_secret_path.display(),
                e
            ))
        })?;
        Ok(client)
    }

    /// Obtains a credential and hands it, with the flow and token file, to
    /// a [`SharedCredential`] that keeps it fresh for the rest of the run.
    pub async fn into_shared(self) -> ProviderResult<SharedCredential<F>> {
        let credential = self.obtain_credentials().await?;
        Ok(SharedCredential::new(credential, self.store, self.flow))
    }

    /// Returns the token file path.
    pub fn token_path(&self) -> &Path {
        self.store.path()
    }
}

/// A credential shared by every Drive request.
///
/// Readers take the current token; the first request to find it expired
/// refreshes it under the write lock and persists the result.
pub struct SharedCredential<F> {
    credential: TokioRwLock<Credential>,
    store: TokenStore,
    flow: F,
}

impl<F: AuthFlow> SharedCredential<F> {
    /// Wraps a credential obtained by [`CredentialManager`].
    pub fn new(credential: Credential, store: TokenStore, flow: F) -> Self {
        Self {
            credential: TokioRwLock::new(credential),
            store,
            flow,
        }
    }

    async fn fresh_token(&self) -> ProviderResult<String> {
        {
            let credential = self.credential.read().await;
            if !credential.is_expired() {
                return Ok(credential.access_token.clone());
            }
        }

        let mut credential = self.credential.write().await;
        // another request may have refreshed while this one waited
        if credential.is_expired() {
            if !credential.can_refresh() {
                return Err(ProviderError::authentication(
                    "access token expired and there is no refresh token, run again to log in",
                ));
            }
            debug!("refreshing expired access token");
            refresh_and_save(&self.flow, &self.store, &mut credential).await?;
        }
        Ok(credential.access_token.clone())
    }
}

impl<F: AuthFlow> AccessTokenSource for SharedCredential<F> {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.fresh_token())
    }
}
