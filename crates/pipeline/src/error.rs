//! Pipeline Error Types
//!
//! A source-level error is reported as a
//! [`RunEvent::SourceFailed`](crate::RunEvent::SourceFailed) and the run moves
//! on. Only errors that affect the whole run end the event stream.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Patterns or seeds of a source don't parse.
    #[display("invalid configuration for source {_0}")]
    Source(#[error(not(source))] String),
    /// Every page of a discovery pass failed to fetch. Classifying an empty
    /// pass would retire everything the source has, so the source is skipped.
    #[display("no page could be fetched for source {_0}")]
    NothingFetched(#[error(not(source))] String),
    #[display("discovery of source {_0} was cancelled")]
    Cancelled(#[error(not(source))] String),
    #[display("tracking store error")]
    Store,
    /// The requested stage reads or writes the tracking store, but the
    /// context has none.
    #[display("this stage needs a tracking store")]
    StoreRequired,
    #[display("could not write artifact {}", _0.display())]
    Artifact(#[error(not(source))] PathBuf),
    #[display("extraction failed for {_0}")]
    Extract(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NothingFetched(_) | Self::Store | Self::Extract(_))
    }
}
