//! Discovery of target pages on a source.
//!
//! A discovery pass starts from a source's seed URLs and walks outbound links
//! breadth-first, recording every URL that matches the source's inclusion
//! patterns. Matching pages are recorded as soon as they are *seen*, whether
//! or not the budget allows them to be fetched, so a page budget never loses
//! a target page that was linked to.
//!
//! Fetching is delegated to a [`PageFetcher`]: [`HttpFetcher`] with the
//! `http` feature, or [`MockFetcher`] with the `mock` feature for tests.

pub mod error;
mod fetch;
mod frontier;
mod links;
mod pattern;

#[cfg(feature = "http")]
pub use crate::fetch::HttpFetcher;
#[cfg(any(test, feature = "mock"))]
pub use crate::fetch::MockFetcher;
pub use crate::fetch::{FetchedPage, FetcherHandle, LinkEntry, LinkGroup, Links, PageFetcher};
pub use crate::frontier::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES, DEFAULT_RATE_LIMIT, DiscoverOptions, DiscoveryReport,
    Frontier, FrontierItem, discover,
};
pub use crate::links::{in_domain, is_denied, normalize};
pub use crate::pattern::{Pattern, UrlMatcher};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
