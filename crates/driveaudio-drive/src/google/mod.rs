//! Google Drive backend.
//!
//! - [`DriveClient`]: the Drive v2 HTTP implementation of [`DriveApi`](crate::DriveApi)
//! - [`CredentialManager`]: loads, refreshes or creates the OAuth token
//! - [`SharedCredential`]: the token every request uses, refreshed on expiry
//! - [`OAuthClient`]: PKCE loopback login and refresh-token exchange
//!
//! # Authentication Flow
//!
//! 1. A valid token in the token file is used as-is
//! 2. An expired token with a refresh token is refreshed and written back
//! 3. Otherwise the client-secret file is read, a loopback listener is bound
//!    on an ephemeral port and the browser is opened on Google's consent page
//! 4. The authorization code is exchanged and the new token overwrites the
//!    token file
//!
//! 5. During the run, a request that finds the token expired refreshes it
//!    first and writes it back
//!
//! A missing client-secret file at step 3 is fatal.

mod client;
mod config;
mod credentials;
mod oauth;
mod tokens;

pub use client::DriveClient;
pub use config::{DriveConfig, OAuthCredentials};
pub use credentials::{
    AccessTokenSource, AuthFlow, CredentialManager, RefreshedToken, SharedCredential,
};
pub use oauth::{OAuthClient, PkceFlow};
pub use tokens::{Credential, GOOGLE_TOKEN_URL, TokenStore};
