use std::time::Duration;

use thiserror::Error;

/// Failures of the management API, reported after local validation passed.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("capacity unavailable in this region: {0}")]
    CapacityUnavailable(String),

    #[error("insufficient quota: {0}")]
    QuotaExceeded(String),

    #[error("management API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("management endpoint cannot address resources: {0}")]
    InvalidEndpoint(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("operation finished in state {state}")]
    OperationFailed { state: String },

    #[error("operation did not finish within {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
