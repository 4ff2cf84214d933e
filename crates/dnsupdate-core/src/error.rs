//! Error types for the updater
//!
//! Every error carries enough information to be placed in exactly one
//! [`FailureClass`], which is what the scheduler branches on.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy driving the scheduler's decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The looked-up record does not exist (first run, or deleted server-side)
    RecordMissing,
    /// A request failed or timed out; expected intermittently
    TransientNetwork,
    /// The provider explicitly refused the request
    ProviderRejected,
    /// No route to the provider or the IP service
    ConnectivityLost,
}

impl FailureClass {
    /// Short name used in log lines and events
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RecordMissing => "record-missing",
            FailureClass::TransientNetwork => "transient-network",
            FailureClass::ProviderRejected => "provider-rejected",
            FailureClass::ConnectivityLost => "connectivity-lost",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the updater
#[derive(Error, Debug)]
pub enum Error {
    /// Record (or zone) not found
    #[error("Record not found: {0}")]
    RecordMissing(String),

    /// Request-level network failure
    #[error("Network error: {0}")]
    Network(String),

    /// An operation did not complete in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
        /// The bound that expired
        after: Duration,
    },

    /// The provider refused the request
    #[error("Rejected by {provider}: {message}")]
    Rejected {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider host is unreachable
    #[error("Connectivity lost: {0}")]
    ConnectivityLost(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "record missing" error
    pub fn record_missing(msg: impl Into<String>) -> Self {
        Self::RecordMissing(msg.into())
    }

    /// Create a transient network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Create a provider rejection
    pub fn rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a connectivity-lost error
    pub fn connectivity_lost(msg: impl Into<String>) -> Self {
        Self::ConnectivityLost(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The failure class this error belongs to
    pub fn class(&self) -> FailureClass {
        match self {
            Error::RecordMissing(_) => FailureClass::RecordMissing,
            Error::Network(_) | Error::Timeout { .. } => FailureClass::TransientNetwork,
            Error::ConnectivityLost(_) => FailureClass::ConnectivityLost,
            Error::Rejected { .. }
            | Error::Config(_)
            | Error::InvalidInput(_)
            | Error::Json(_)
            | Error::Other(_) => FailureClass::ProviderRejected,
        }
    }

    /// Shorthand for `self.class() == FailureClass::RecordMissing`
    pub fn is_record_missing(&self) -> bool {
        self.class() == FailureClass::RecordMissing
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
