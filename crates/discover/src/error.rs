//! Discovery Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only the setup of a discovery pass can fail. Once a pass is running, fetch
//! errors are folded into the pass as pages without links.

use derive_more::{Display, Error};

/// A discovery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing to start crawling from; fix the source configuration.
    #[display("no seed URLs configured")]
    NoSeeds,
    #[display("invalid seed URL: {_0}")]
    InvalidSeed(#[error(not(source))] String),
    #[display("invalid URL pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// The fetcher could not produce a page for the URL.
    #[display("could not fetch {_0}")]
    Fetch(#[error(not(source))] String),
    /// Connection, TLS or client setup failure.
    #[display("network error")]
    Network,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Network)
    }

    /// Precondition failures need the configuration fixed, not a retry.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoSeeds | Self::InvalidSeed(_) | Self::InvalidPattern(_))
    }
}
