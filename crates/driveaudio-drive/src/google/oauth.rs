//! OAuth 2.0 installed-application flow for Google Drive.
//!
//! Authorization Code flow with PKCE and a loopback redirect:
//!
//! 1. Generate a code verifier, its SHA-256 challenge and a random state
//! 2. Bind a loopback listener on an OS-assigned port
//! 3. Open the browser on Google's consent page
//! 4. Receive `code` and `state` on `/callback`
//! 5. Exchange the code (with the verifier) for access and refresh tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::api::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;
use super::credentials::{AuthFlow, RefreshedToken};
use super::tokens::{Credential, GOOGLE_TOKEN_URL};

/// Google OAuth consent endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long to wait for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Talks to Google's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Runs the interactive consent flow and returns a fresh credential.
    pub async fn authorize(
        &self,
        client: &OAuthCredentials,
        scopes: &[String],
    ) -> ProviderResult<Credential> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback()?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = pkce.build_auth_url(&client.client_id, &redirect_uri, scopes);

        info!("starting OAuth flow, opening browser...");
        debug!("authorization URL: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        // the listener blocks, so it gets its own thread
        let callback = tokio::task::spawn_blocking(move || wait_for_callback(listener))
            .await
            .map_err(|e| ProviderError::internal(format!("callback task failed: {}", e)))??;

        if callback.state.as_deref() != Some(pkce.state.as_str()) {
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens...");
        let params = [
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", callback.code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let token = self.post_token(GOOGLE_TOKEN_URL, &params).await?;

        Ok(Credential::new(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            client,
            scopes.to_vec(),
        ))
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(&self, credential: &Credential) -> ProviderResult<RefreshedToken> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::authentication("no refresh token available"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let token = self.post_token(&credential.token_uri, &params).await?;

        info!("refreshed access token");
        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
        })
    }

    async fn post_token(&self, url: &str, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid token response: {}", e)))
    }
}

impl AuthFlow for OAuthClient {
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(OAuthClient::refresh(self, credential))
    }

    fn authorize<'a>(
        &'a self,
        client: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(OAuthClient::authorize(self, client, scopes))
    }
}

/// Binds the loopback listener on a port chosen by the OS.
fn bind_loopback() -> ProviderResult<(TcpListener, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| {
        ProviderError::configuration(format!("failed to bind loopback listener: {}", e))
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| ProviderError::internal(format!("failed to read loopback address: {}", e)))?
        .port();
    debug!(port, "bound loopback listener");
    Ok((listener, port))
}

/// Accepts connections until one carries the OAuth redirect.
fn wait_for_callback(listener: TcpListener) -> ProviderResult<CallbackParams> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_connection(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(ProviderError::authentication("OAuth callback timeout"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("callback channel disconnected"))
        }
    }
}

/// Reads one request; returns `None` for anything that is not the callback.
fn handle_connection(mut stream: TcpStream) -> Option<ProviderResult<CallbackParams>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let target = request_line
        .strip_prefix("GET ")?
        .split_whitespace()
        .next()?;
    let query = target.strip_prefix("/callback")?;
    let query = query.strip_prefix('?').unwrap_or(query);

    let result = parse_callback_query(query);
    let page = match &result {
        Ok(_) => {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization Successful</h1>\
            <p>You can close this window and return to the terminal.</p></body></html>"
        }
        Err(_) => {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization Failed</h1>\
            <p>You can close this window.</p></body></html>"
        }
    };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// What Google sent back on the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CallbackParams {
    code: String,
    state: Option<String>,
}

fn parse_callback_query(query: &str) -> ProviderResult<CallbackParams> {
    let mut code = None;
    let mut state = None;

    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => {
                return Err(ProviderError::authentication(format!(
                    "authorization denied: {}",
                    value
                )));
            }
            _ => {}
        }
    }

    code.map(|code| CallbackParams { code, state })
        .ok_or_else(|| ProviderError::authentication("missing authorization code in callback"))
}

/// PKCE values for one authorization attempt (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of the verifier, base64url).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent URL, asking for offline access so a refresh
    /// token is issued.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_verifier_length() {
        // 32 bytes base64url without padding
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_is_deterministic() {
        assert_eq!(
            PkceFlow::compute_challenge("verifier"),
            PkceFlow::compute_challenge("verifier")
        );
    }

    #[test]
    fn pkce_state_is_random() {
        assert_ne!(PkceFlow::new().state, PkceFlow::new().state);
    }

    #[test]
    fn auth_url_requests_drive_scope() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            "client.apps.googleusercontent.com",
            "http://127.0.0.1:40000/callback",
            &["https://www.googleapis.com/auth/drive.readonly".to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive.readonly"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A40000%2Fcallback"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn callback_with_code_and_state() {
        let params = parse_callback_query("code=4%2F0Abc&state=xyz&scope=drive").unwrap();
        assert_eq!(params.code, "4/0Abc");
        assert_eq!(params.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn callback_with_error() {
        let err = parse_callback_query("error=access_denied").unwrap_err();
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn callback_without_code() {
        assert!(parse_callback_query("state=xyz").is_err());
        assert!(parse_callback_query("").is_err());
    }

    #[test]
    fn loopback_binds_ephemeral_port() {
        let (_listener, port) = bind_loopback().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn parse_token_response() {
        let json = r#"{"access_token":"ya29.a","expires_in":3599,"scope":"x","token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.a");
        assert_eq!(token.expires_in, Some(3599));
        assert!(token.refresh_token.is_none());
    }
}
