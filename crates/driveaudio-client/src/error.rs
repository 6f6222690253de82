//! Client error types.

use std::fmt;

use driveaudio_drive::{ProviderError, ProviderErrorCode};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Error talking to Drive or obtaining credentials.
    Drive(ProviderError),
    /// IO error.
    Io(std::io::Error),
    /// A download worker could not be joined.
    Task(String),
}

impl ClientError {
    /// Returns true if this is the missing client-secret error.
    pub fn is_missing_client_secret(&self) -> bool {
        matches!(self, Self::Drive(err) if err.code() == ProviderErrorCode::MissingClientSecret)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Drive(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Task(msg) => write!(f, "download task failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Drive(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Drive(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_client_secret_is_detected() {
        let err = ClientError::from(ProviderError::missing_client_secret("no credentials.json"));
        assert!(err.is_missing_client_secret());
        assert!(std::error::Error::source(&err).is_some());

        let err = ClientError::from(ProviderError::server("boom"));
        assert!(!err.is_missing_client_secret());
        assert!(!ClientError::Config("bad".into()).is_missing_client_secret());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ClientError::Config("bad workers".into()).to_string(),
            "configuration error: bad workers"
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(ClientError::from(io).to_string().starts_with("IO error"));
    }
}
