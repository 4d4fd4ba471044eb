//! Error types shared by the load generator and the responder.
//!
//! ## Error Cases
//! - [`ConfigError`]: invalid startup configuration. Fatal before any worker
//!   or listener starts.
//! - [`TransportError`]: a single command could not be delivered or its
//!   acknowledgement could not be read. Fatal to the originating worker only;
//!   never retried.

use core::time::Duration;

/// Longest interval between two requests of one worker (one week).
pub const MAX_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Rejected startup configuration.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The request rate is zero, negative, or not a finite number.
    #[error("Invalid rate {0}: must be a finite number of requests per second greater than 0")]
    InvalidRate(f64),

    /// The request rate is so high that its interval rounds down to zero.
    #[error("Rate {0} is too high: the interval between requests rounds to zero")]
    RateTooHigh(f64),

    /// The request rate is so low that its interval exceeds the longest
    /// supported pacing period.
    #[error("Rate {0} is too low: the interval between requests exceeds {max:?}", max = MAX_PERIOD)]
    RateTooLow(f64),

    /// The pool was asked to run without workers.
    #[error("Client count must be greater than 0")]
    NoWorkers,

    /// The target base address cannot be used to build request URLs.
    #[error("Invalid target `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    /// The timestamp mode is not one of the supported spellings.
    #[error("Unknown timestamp mode `{0}` (expected `epoch` or `second-of-minute`)")]
    UnknownTimestampMode(String),
}

/// Failure to deliver one command or to read its acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No connection could be established with the target.
    #[error("Connect error for {url}: {reason}")]
    Connect { url: String, reason: String },

    /// No response arrived before the configured deadline.
    #[error("Timed out after {after:?} waiting for {url}")]
    Timeout { url: String, after: Duration },

    /// The response body is not an acknowledgement envelope.
    #[error("Decode error for {url} (HTTP {status}): {reason}")]
    Decode {
        url: String,
        status: u16,
        reason: String,
    },

    /// Any other transport-level failure (malformed URL, connection reset
    /// while reading the body, client construction).
    #[error("Request error for {url}: {reason}")]
    Request { url: String, reason: String },
}

impl TransportError {
    /// Short label used as a structured log field.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Timeout { .. } => "timeout",
            Self::Decode { .. } => "decode",
            Self::Request { .. } => "request",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Connect { url, .. }
            | Self::Timeout { url, .. }
            | Self::Decode { url, .. }
            | Self::Request { url, .. } => url,
        }
    }
}
