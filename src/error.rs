//! Error taxonomy for the gateway, the token storage and configuration.

use http::StatusCode;
use thiserror::Error;

/// Why a credential refresh did not produce a new access token.
///
/// Cloned into every waiter of a refresh cycle, so it only carries owned,
/// cheap data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("refresh rejected by the server with status {status}")]
    Rejected { status: u16 },
    #[error("refresh transport failure: {0}")]
    Network(String),
    #[error("refresh response could not be decoded: {0}")]
    Malformed(String),
    #[error("refresh timed out")]
    Timeout,
    #[error("refreshed tokens could not be persisted: {0}")]
    Storage(String),
    #[error("no refresh token is stored")]
    NoRefreshToken,
    #[error("the session was cleared")]
    SessionCleared,
    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

/// Failure of a single transport round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<TransportError> for RefreshFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => RefreshFailure::Timeout,
            TransportError::Network(msg) | TransportError::InvalidRequest(msg) => {
                RefreshFailure::Network(msg)
            }
        }
    }
}

/// Persistence failures of the secure storage port.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored session is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Everything `AuthGateway::execute` can surface to a caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("HTTP error {status}")]
    Http { status: StatusCode, body: String },
    #[error("request was not authorized")]
    Unauthorized,
    #[error("session expired: {0}")]
    AuthExpired(RefreshFailure),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// True when the session is gone and the user has to sign in again.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, GatewayError::AuthExpired(_))
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(msg) => GatewayError::Network(msg),
            TransportError::Timeout => GatewayError::Timeout,
            TransportError::InvalidRequest(msg) => GatewayError::InvalidRequest(msg),
        }
    }
}
