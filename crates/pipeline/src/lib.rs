//! Runs over every configured source.
//!
//! A run walks the sources in order. For each one it discovers matching
//! pages, classifies them against the tracking store, extracts what's new and
//! writes the result back. Afterwards it leaves a summary of every
//! discovered URL on disk and a row in the run history.
//!
//! Progress is reported as a stream of [`RunEvent`]s. A failing source is
//! reported and skipped; it never aborts the run.

mod artifacts;
pub mod error;
mod estimate;
mod extract;
mod source;
mod stream;

pub use crate::artifacts::{DiscoverySummary, Listing, SUMMARY_FILE, discovered_dir, write_listing, write_summary};
pub use crate::estimate::{COST_PER_ITEM_USD, Estimate, TIME_PER_ITEM, estimate};
pub use crate::extract::{Extraction, Extractor, ExtractorHandle, ItemOutcome};
pub use crate::source::{discover_options, plan_with_extractions, with_hints};
pub use crate::stream::{RunEvent, RunSummary, run};
use spoor_cache::Repository;
use spoor_discover::{CancellationToken, FetcherHandle};
use std::path::PathBuf;
use std::time::Duration;
use time::{Date, OffsetDateTime};

/// How far a run goes for each source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Discover and write listings. The store is not touched.
    Discover,
    /// Also classify against the store, without writing to it.
    Detect,
    /// Classify, extract, write back and record the run.
    Run,
}

impl Stage {
    fn needs_store(self) -> bool {
        !matches!(self, Self::Discover)
    }
}

/// Everything a run needs besides the sources themselves.
#[derive(Clone)]
pub struct Context {
    fetcher: FetcherHandle,
    output: PathBuf,
    stage: Stage,
    date: Date,
    repository: Option<Repository>,
    extractor: Option<ExtractorHandle>,
    delay_between_sources: Duration,
    cancel: CancellationToken,
}

impl Context {
    /// A full run dated today (UTC), with no store attached yet.
    pub fn new(fetcher: FetcherHandle, output: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            output: output.into(),
            stage: Stage::Run,
            date: OffsetDateTime::now_utc().date(),
            repository: None,
            extractor: None,
            delay_between_sources: Duration::ZERO,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_date(mut self, date: Date) -> Self {
        self.date = date;
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Without an extractor, new items are tracked under the fingerprint
    /// they were discovered with.
    pub fn with_extractor(mut self, extractor: ExtractorHandle) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_delay_between_sources(mut self, delay: Duration) -> Self {
        self.delay_between_sources = delay;
        self
    }

    /// Cancelling stops the current discovery pass between rounds and skips
    /// the remaining sources.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn output(&self) -> &std::path::Path {
        &self.output
    }
}
