//! Tracking Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The store has not been initialized yet. Create it instead of retrying.
    #[display("tracking store not found: {}", _0.display())]
    StoreMissing(#[error(not(source))] PathBuf),
    /// A write-back referenced an entity that isn't in the store (the
    /// snapshot it was classified against is stale).
    #[display("entity not found: {_0}")]
    EntityNotFound(#[error(not(source))] String),
    /// Serialization/deserialization error.
    #[display("invalid store data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }

    /// Returns `true` if the caller should initialize the store first.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::StoreMissing(_))
    }
}
