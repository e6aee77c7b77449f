//! Command-line Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("no source with slug {_0:?} is configured")]
    UnknownSource(#[error(not(source))] String),
    #[display("tracking store not found at {}; run `spoor init` first", _0.display())]
    StoreMissing(#[error(not(source))] PathBuf),
    #[display("tracking store error")]
    Store,
    #[display("could not set up the page fetcher")]
    Fetcher,
    #[display("run aborted")]
    Run,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store | Self::Run)
    }
}
