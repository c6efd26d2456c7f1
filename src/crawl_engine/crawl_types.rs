//! Core types for outbound requests and their outcomes.
//!
//! Every network call made by the pipeline ends in a [`RequestOutcome`]: a
//! tagged value carrying either the result or a [`FailureReason`]. Errors never
//! escape the executor boundary as `Err`.

use std::fmt;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced by a single attempt of an outbound call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The call did not complete within its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, reset, DNS failure and similar
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The remote answered with a non-success HTTP status
    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    /// Anything else (invalid request, body decoding, renderer faults)
    #[error("Request failed: {0}")]
    Other(String),
}

impl RequestError {
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Classify the error for retry decisions
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) | Self::Connection(_) => FailureKind::Network,
            Self::Status { status: 429, .. } => FailureKind::RateLimited,
            Self::Status { status, .. } if (500..=599).contains(status) => FailureKind::Server,
            Self::Status { status, .. } if (400..=499).contains(status) => FailureKind::Client,
            Self::Status { .. } | Self::Other(_) => FailureKind::Unknown,
        }
    }

    /// Build an error from a free-form message, based on error message patterns
    ///
    /// Used for collaborators (such as the headless renderer) that only
    /// report errors as text.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let msg = message.to_lowercase();

        if msg.contains("429") || msg.contains("too many requests") || msg.contains("rate limit") {
            return Self::status(429, message);
        }
        if msg.contains("timeout") || msg.contains("timed out") {
            return Self::Timeout(message);
        }
        if msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("unreachable")
        {
            return Self::Connection(message);
        }
        Self::Other(message)
    }
}

/// Whether an I/O error somewhere in the source chain means the peer went away
fn is_dropped_connection(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = current.source();
    }
    false
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect()
            || err.is_request()
            || err.is_body()
            || is_dropped_connection(&err)
        {
            // Accepted-then-dropped connections surface as request/body errors
            Self::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Categorizes request failures for retry decisions
///
/// - Network errors are usually transient: retried with backoff
/// - Server errors and throttling: retried with backoff
/// - Client errors: permanent, fail fast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, DNS, connection refused
    Network,
    /// HTTP 5xx
    Server,
    /// HTTP 429
    RateLimited,
    /// HTTP 4xx other than 429
    Client,
    /// Unknown/unclassified error
    Unknown,
}

impl FailureKind {
    /// Whether this failure kind should be retried
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Server | Self::RateLimited => true,
            Self::Client | Self::Unknown => false,
        }
    }
}

/// Why a logical request (or crawl) failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The service circuit is open; no call was attempted
    ServiceUnavailable { service: String },
    /// Non-retryable 4xx response
    ClientError { status: u16, message: String },
    /// Non-retryable failure that is not an HTTP status
    RequestFailed { message: String },
    /// All attempts failed with retryable errors
    RetriesExhausted { attempts: u32, last_error: String },
    /// The input URL is not a well-formed http(s) URL
    InvalidUrl { message: String },
    /// The payload was fetched but could not be turned into a document
    Extraction { message: String },
    /// The document could not be persisted
    Storage { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceUnavailable { service } => {
                write!(f, "Service unavailable: circuit open for '{service}'")
            }
            Self::ClientError { status, message } => write!(f, "Client error {status}: {message}"),
            Self::RequestFailed { message } => write!(f, "Request failed: {message}"),
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "Gave up after {attempts} attempts: {last_error}"),
            Self::InvalidUrl { message } => write!(f, "Invalid URL: {message}"),
            Self::Extraction { message } => write!(f, "Extraction failed: {message}"),
            Self::Storage { message } => write!(f, "Storage failed: {message}"),
        }
    }
}

/// Tagged result of a logical request
#[derive(Debug, Clone)]
pub enum RequestOutcome<V> {
    Success {
        value: V,
        /// Served from the response cache without a call
        from_cache: bool,
        /// Network attempts made (0 for cache hits)
        attempts: u32,
    },
    Failure {
        reason: FailureReason,
        attempts: u32,
    },
}

impl<V> RequestOutcome<V> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    /// Convert into a plain `Result`, dropping attempt bookkeeping
    pub fn into_result(self) -> Result<V, FailureReason> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { reason, .. } => Err(reason),
        }
    }
}

/// Raw payload returned by a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Produced by the headless renderer rather than a plain HTTP GET
    pub rendered: bool,
}
