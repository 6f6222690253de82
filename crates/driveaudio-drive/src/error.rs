//! Error types for Drive operations.
//!
//! Every failure that crosses the Drive boundary (HTTP, OAuth, token
//! storage, protocol checks) is a [`ProviderError`] tagged with a
//! [`ProviderErrorCode`]. The code decides whether the retry wrapper
//! tries again.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// The OAuth client-secret file is absent and no usable token exists.
    MissingClientSecret,
    /// Authentication failed or credentials are invalid/expired (401).
    AuthenticationFailed,
    /// Authorization failed - user lacks permission (403).
    AuthorizationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded (429).
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Resource not found (404).
    NotFound,
    /// Request was invalid (400 and other 4xx).
    BadRequest,
    /// A remote call kept failing and the retry budget ran out.
    RetriesExhausted,
    /// The remote side broke the listing contract (e.g. several items on a
    /// single-item page).
    ProtocolViolation,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if the error came from the HTTP layer.
    ///
    /// Every HTTP-layer failure is retried the same way: a 403 is retried
    /// exactly like a 503.
    pub fn is_http(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::AuthorizationFailed
                | Self::NetworkError
                | Self::RateLimited
                | Self::ServerError
                | Self::NotFound
                | Self::BadRequest
        )
    }

    /// Returns a human-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingClientSecret => "missing_client_secret",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::RetriesExhausted => "retries_exhausted",
            Self::ProtocolViolation => "protocol_violation",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to Google Drive or its OAuth
/// endpoints.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// HTTP status, when the error came from a response.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates an error for a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            401 => ProviderErrorCode::AuthenticationFailed,
            403 => ProviderErrorCode::AuthorizationFailed,
            404 => ProviderErrorCode::NotFound,
            429 => ProviderErrorCode::RateLimited,
            500..=599 => ProviderErrorCode::ServerError,
            _ => ProviderErrorCode::BadRequest,
        };
        let mut err = Self::new(code, message);
        err.status = Some(status);
        err
    }

    /// Creates the fatal error for a missing client-secret file.
    pub fn missing_client_secret(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::MissingClientSecret, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates a retries-exhausted error.
    pub fn retries_exhausted(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RetriesExhausted, message)
    }

    /// Creates a protocol-violation error.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ProtocolViolation, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if this error came from the HTTP layer.
    pub fn is_http(&self) -> bool {
        self.code.is_http()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timeout".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), message).with_source(err),
            None => Self::network(message).with_source(err),
        }
    }
}

/// A specialized Result type for Drive operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_codes_are_retried_uniformly() {
        assert!(ProviderErrorCode::NetworkError.is_http());
        assert!(ProviderErrorCode::ServerError.is_http());
        assert!(ProviderErrorCode::RateLimited.is_http());
        assert!(ProviderErrorCode::AuthorizationFailed.is_http());
        assert!(ProviderErrorCode::NotFound.is_http());
        assert!(!ProviderErrorCode::InvalidResponse.is_http());
        assert!(!ProviderErrorCode::ProtocolViolation.is_http());
        assert!(!ProviderErrorCode::RetriesExhausted.is_http());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProviderError::from_status(401, "x").code(),
            ProviderErrorCode::AuthenticationFailed
        );
        assert_eq!(
            ProviderError::from_status(403, "x").code(),
            ProviderErrorCode::AuthorizationFailed
        );
        assert_eq!(
            ProviderError::from_status(404, "x").code(),
            ProviderErrorCode::NotFound
        );
        assert_eq!(
            ProviderError::from_status(429, "x").code(),
            ProviderErrorCode::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(503, "x").code(),
            ProviderErrorCode::ServerError
        );
        assert_eq!(
            ProviderError::from_status(418, "x").code(),
            ProviderErrorCode::BadRequest
        );
        assert_eq!(ProviderError::from_status(503, "x").status(), Some(503));
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::protocol_violation("2 items on one page");
        let display = format!("{}", err);
        assert!(display.contains("protocol_violation"));
        assert!(display.contains("2 items on one page"));
    }

    #[test]
    fn provider_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ProviderError::internal("failed to write token").with_source(io_err);
        assert!(err.source().is_some());
        assert!(err.status().is_none());
    }
}
