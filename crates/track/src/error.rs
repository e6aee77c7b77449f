//! Tracking Error Types
//!
//! Fingerprinting and classification are infallible; the only errors this
//! crate produces come from parsing persisted values back into models.

use derive_more::{Display, Error};

/// A tracking error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("unknown entity status: {_0}")]
    UnknownStatus(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
