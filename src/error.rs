use std::fmt;
use thiserror::Error;

/// Why a `send` call ended in a `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The URL or payload was rejected before any attempt was made.
    InvalidInput,
    /// Connection error, timeout, redirect overflow or an empty body.
    Transport,
    /// The peer answered with a 5xx status.
    ServerError,
    /// The peer answered with a 4xx status. Never retried.
    ClientError,
    /// Every attempt in the budget failed with a retryable error.
    ExhaustedRetries,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match *self {
            FailureKind::InvalidInput => "invalid input",
            FailureKind::Transport => "transport error",
            FailureKind::ServerError => "server error",
            FailureKind::ClientError => "client error",
            FailureKind::ExhaustedRetries => "retries exhausted",
        };
        f.write_str(kind)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("Invalid URL '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("Unsupported URL scheme '{0}', expected http or https")]
    Scheme(String),

    #[error("Payload could not be encoded: {0}")]
    Payload(String),
}

/// A single attempt that never produced a usable HTTP response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Too many redirects: {0}")]
    Redirect(String),

    #[error("Could not read response body: {0}")]
    Body(String),

    #[error("Could not build HTTP client: {0}")]
    Builder(String),

    #[error("Transport error: {0}")]
    Other(String),
}
