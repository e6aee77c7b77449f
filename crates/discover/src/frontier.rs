//! Breadth-first discovery pass for a single source.

use crate::error::{Error, ErrorKind, Result};
use crate::fetch::{FetchedPage, FetcherHandle};
use crate::links;
use crate::pattern::UrlMatcher;
use exn::{OptionExt, ResultExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

pub const DEFAULT_MAX_DEPTH: u32 = 3;
pub const DEFAULT_MAX_PAGES: usize = 500;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(1);

/// Budgets and scope of a discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub seeds: Vec<Url>,
    pub matcher: UrlMatcher,
    /// Links whose host doesn't contain this are not followed.
    pub domain: String,
    /// Hops from a seed beyond which links are no longer followed.
    pub max_depth: u32,
    /// Upper bound on URLs taken off the frontier.
    pub max_pages: usize,
    /// Fetches per round.
    pub concurrency: usize,
    /// Delay between rounds.
    pub rate_limit: Duration,
}

impl DiscoverOptions {
    /// Options with default budgets, scoped to the host of the first seed.
    pub fn new<S: AsRef<str>>(seeds: impl IntoIterator<Item = S>, matcher: UrlMatcher) -> Result<Self> {
        let seeds = seeds
            .into_iter()
            .map(|seed| {
                let seed = seed.as_ref();
                Url::parse(seed).or_raise(|| ErrorKind::InvalidSeed(seed.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let first = seeds.first().ok_or_raise(|| ErrorKind::NoSeeds)?;
        let domain = first.host_str().ok_or_raise(|| ErrorKind::InvalidSeed(first.to_string()))?.to_string();
        Ok(Self {
            seeds,
            matcher,
            domain,
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: DEFAULT_RATE_LIMIT,
        })
    }

    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domain = domain.as_ref().to_lowercase();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Clamped to at least one fetch per round.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: Url,
    pub depth: u32,
}

/// Outcome of a discovery pass. Also returned (with `cancelled` set) when
/// the pass was stopped early; whatever was discovered up to that point is
/// valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Matching URLs in discovery order.
    pub discovered: Vec<Url>,
    /// URLs taken off the frontier (never more than `max_pages`).
    pub visited: usize,
    pub fetched: usize,
    pub failed: usize,
    pub rounds: usize,
    pub cancelled: bool,
}

impl DiscoveryReport {
    pub fn urls(&self) -> Vec<String> {
        self.discovered.iter().map(Url::to_string).collect()
    }
}

#[derive(Debug)]
enum Failure {
    Unsuccessful(Option<String>),
    Error(Error),
    Panicked(String),
}

#[derive(Debug)]
enum TaskOutcome {
    Fetched(FetchedPage),
    Failed(Failure),
}

/// Mutable state of one pass. Only the round controller touches it; fetch
/// tasks hand their results back instead of writing here.
#[derive(Debug, Default)]
struct CrawlState {
    frontier: VecDeque<FrontierItem>,
    visited: HashSet<String>,
    /// Every URL ever put on the frontier.
    scheduled: HashSet<String>,
    discovered: Vec<Url>,
    recorded: HashSet<String>,
}

impl CrawlState {
    fn seeded(seeds: &[Url]) -> Self {
        let mut state = Self::default();
        for seed in seeds {
            let mut seed = seed.clone();
            seed.set_fragment(None);
            state.enqueue(seed, 0);
        }
        state
    }

    fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        if self.visited.contains(url.as_str()) || !self.scheduled.insert(url.to_string()) {
            return false;
        }
        self.frontier.push_back(FrontierItem { url, depth });
        true
    }

    fn record(&mut self, url: &Url) -> bool {
        if !self.recorded.insert(url.to_string()) {
            return false;
        }
        self.discovered.push(url.clone());
        true
    }

    /// Take up to `limit` unvisited items off the front of the frontier,
    /// marking each visited.
    fn next_batch(&mut self, limit: usize) -> Vec<FrontierItem> {
        let mut batch = Vec::with_capacity(limit);
        while batch.len() < limit
            && let Some(item) = self.frontier.pop_front()
        {
            if self.visited.insert(item.url.to_string()) {
                batch.push(item);
            }
        }
        batch
    }
}

/// Runs discovery passes with one fetcher and one set of options.
pub struct Frontier {
    fetcher: FetcherHandle,
    options: DiscoverOptions,
}

impl Frontier {
    pub fn new(fetcher: FetcherHandle, options: DiscoverOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &DiscoverOptions {
        &self.options
    }

    /// Run one discovery pass.
    ///
    /// Rounds run strictly one after another: each takes up to
    /// `concurrency` items off the frontier, fetches them concurrently, then
    /// processes the results in dispatch order. Given the same fetcher
    /// responses, two passes discover the same URLs in the same order.
    ///
    /// `cancel` is checked between rounds, never during one.
    #[instrument(skip_all, fields(domain = %self.options.domain))]
    pub async fn discover(&self, cancel: &CancellationToken) -> DiscoveryReport {
        let options = &self.options;
        let mut state = CrawlState::seeded(&options.seeds);
        let mut report = DiscoveryReport::default();

        while !state.frontier.is_empty() && state.visited.len() < options.max_pages {
            if report.rounds > 0 && !options.rate_limit.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => {},
                    () = tokio::time::sleep(options.rate_limit) => {},
                }
            }
            if cancel.is_cancelled() {
                tracing::info!(visited = state.visited.len(), found = state.discovered.len(), "Discovery cancelled");
                report.cancelled = true;
                break;
            }

            let budget = options.max_pages - state.visited.len();
            let batch = state.next_batch(options.concurrency.min(budget));
            if batch.is_empty() {
                break;
            }
            report.rounds += 1;
            for item in &batch {
                if options.matcher.matches_inclusion(item.url.as_str()) {
                    state.record(&item.url);
                }
            }

            for (item, outcome) in self.fetch_round(batch).await {
                match outcome {
                    TaskOutcome::Fetched(page) => {
                        report.fetched += 1;
                        self.follow(&mut state, &item, &page);
                    },
                    TaskOutcome::Failed(failure) => {
                        report.failed += 1;
                        tracing::warn!(url = %item.url, ?failure, "Fetch failed; treating page as having no links");
                    },
                }
            }
            tracing::debug!(
                round = report.rounds,
                visited = state.visited.len(),
                queued = state.frontier.len(),
                found = state.discovered.len(),
                "Discovery round complete"
            );
        }

        report.visited = state.visited.len();
        report.discovered = state.discovered;
        tracing::info!(
            visited = report.visited,
            fetched = report.fetched,
            failed = report.failed,
            found = report.discovered.len(),
            "Discovery pass complete"
        );
        report
    }

    /// Fetch every item of the batch that is shallow enough to be followed.
    ///
    /// Each fetch runs as its own task so that a panicking fetcher only fails
    /// its own URL. Results come back in dispatch order.
    async fn fetch_round(&self, batch: Vec<FrontierItem>) -> Vec<(FrontierItem, TaskOutcome)> {
        let batch = batch.into_iter().filter(|item| item.depth < self.options.max_depth).collect::<Vec<_>>();
        let handles = batch
            .iter()
            .map(|item| {
                let fetcher = Arc::clone(&self.fetcher);
                let url = item.url.clone();
                tokio::spawn(async move { fetcher.fetch(&url).await })
            })
            .collect::<Vec<_>>();
        let results = futures::future::join_all(handles).await;
        batch
            .into_iter()
            .zip(results)
            .map(|(item, joined)| {
                let outcome = match joined {
                    Ok(Ok(page)) if page.success => TaskOutcome::Fetched(page),
                    Ok(Ok(page)) => TaskOutcome::Failed(Failure::Unsuccessful(page.error_message)),
                    Ok(Err(err)) => TaskOutcome::Failed(Failure::Error(err)),
                    Err(join) => TaskOutcome::Failed(Failure::Panicked(join.to_string())),
                };
                (item, outcome)
            })
            .collect()
    }

    /// Record and enqueue the outbound links of a fetched page.
    fn follow(&self, state: &mut CrawlState, item: &FrontierItem, page: &FetchedPage) {
        let matcher = &self.options.matcher;
        for href in page.links.hrefs() {
            let Some(link) = links::normalize(&item.url, href) else {
                continue;
            };
            if !links::in_domain(&link, &self.options.domain)
                || links::is_denied(&link)
                || matcher.is_excluded(link.as_str())
            {
                continue;
            }
            // Recorded before it's queued: the page budget may run out
            // before this link is ever dequeued.
            if matcher.matches_inclusion(link.as_str()) {
                state.record(&link);
            }
            state.enqueue(link, item.depth + 1);
        }
    }
}

/// Run a single discovery pass.
pub async fn discover(fetcher: FetcherHandle, options: DiscoverOptions, cancel: &CancellationToken) -> DiscoveryReport {
    Frontier::new(fetcher, options).discover(cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Links, MockFetcher, PageFetcher};
    use async_trait::async_trait;
    use rstest::rstest;
    use serde_json::json;

    const ROOT: &str = "https://example.com/";

    fn options(seeds: &[&str]) -> DiscoverOptions {
        let matcher = UrlMatcher::parse(["*/models/*.html"], ["*excluded*"]).unwrap();
        DiscoverOptions::new(seeds, matcher).unwrap().with_rate_limit(Duration::ZERO)
    }

    async fn run(fetcher: &Arc<MockFetcher>, options: DiscoverOptions) -> DiscoveryReport {
        let handle: FetcherHandle = fetcher.clone();
        discover(handle, options, &CancellationToken::new()).await
    }

    fn paths(report: &DiscoveryReport) -> Vec<&str> {
        report.discovered.iter().map(Url::path).collect()
    }

    fn site() -> MockFetcher {
        MockFetcher::default()
            .page(ROOT, ["/models/a.html", "/catalog/", "/about"])
            .page("https://example.com/catalog/", ["/models/b.html", "/models/c.html", "/catalog/"])
            .page("https://example.com/models/a.html", ["/models/d.html"])
    }

    #[tokio::test]
    async fn test_discovers_in_breadth_first_order() {
        let fetcher = Arc::new(site());
        let report = run(&fetcher, options(&[ROOT]).with_concurrency(2)).await;
        assert_eq!(paths(&report), vec!["/models/a.html", "/models/d.html", "/models/b.html", "/models/c.html"]);
        assert_eq!(report.visited, 7);
        assert_eq!(report.rounds, 4);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.failed, 4);
        assert!(!report.cancelled);
        let fetched = fetcher.fetched().await;
        assert_eq!(fetched.len(), 7);
        assert_eq!(fetched[0], ROOT);
    }

    #[tokio::test]
    async fn test_identical_responses_give_identical_order() {
        let first = run(&Arc::new(site()), options(&[ROOT]).with_concurrency(3)).await;
        let second = run(&Arc::new(site()), options(&[ROOT]).with_concurrency(3)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_page_budget_keeps_linked_targets() {
        let targets = (0..10).map(|i| format!("/models/{i}.html")).collect::<Vec<_>>();
        let fetcher = Arc::new(MockFetcher::default().page(ROOT, targets.clone()));
        let report = run(&fetcher, options(&[ROOT]).with_max_pages(3)).await;
        assert_eq!(report.visited, 3);
        assert_eq!(fetcher.fetched().await.len(), 3);
        assert_eq!(paths(&report), targets.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_depth_limit_still_records_deepest_links() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(ROOT, ["/models/l1.html"])
                .page("https://example.com/models/l1.html", ["/models/l2.html"])
                .page("https://example.com/models/l2.html", ["/models/l3.html"]),
        );
        let report = run(&fetcher, options(&[ROOT]).with_max_depth(2)).await;
        assert_eq!(paths(&report), vec!["/models/l1.html", "/models/l2.html"]);
        assert_eq!(fetcher.fetched().await, vec![ROOT, "https://example.com/models/l1.html"]);
        assert_eq!(report.visited, 3);
    }

    #[tokio::test]
    async fn test_zero_depth_only_checks_seeds() {
        let fetcher = Arc::new(site());
        let report = run(&fetcher, options(&[ROOT, "https://example.com/models/a.html"]).with_max_depth(0)).await;
        assert_eq!(paths(&report), vec!["/models/a.html"]);
        assert!(fetcher.fetched().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(ROOT, ["/a", "/b", "/c", "/d"])
                .erroring("https://example.com/a")
                .panicking("https://example.com/b")
                .failing("https://example.com/c", "HTTP 503")
                .page("https://example.com/d", ["/models/x.html"]),
        );
        let report = run(&fetcher, options(&[ROOT]).with_concurrency(4)).await;
        assert_eq!(paths(&report), vec!["/models/x.html"]);
        assert_eq!(report.failed, 4);
        assert_eq!(report.fetched, 2);
    }

    #[tokio::test]
    async fn test_link_filtering() {
        let fetcher = Arc::new(MockFetcher::default().page(
            ROOT,
            [
                "https://other.example/models/offsite.html",
                "/models/excluded.html",
                "/search/models/results.html",
                "mailto:sales@example.com",
                "/models/ok.html#specs",
                "/models/ok.html",
            ],
        ));
        let report = run(&fetcher, options(&[ROOT])).await;
        assert_eq!(report.urls(), vec!["https://example.com/models/ok.html"]);
        assert_eq!(fetcher.fetched().await, vec![ROOT, "https://example.com/models/ok.html"]);
    }

    #[tokio::test]
    async fn test_grouped_and_malformed_links() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page_with_links(
                    ROOT,
                    Links::from_json(json!({
                        "internal": [{"href": "/models/a.html"}, "/next"],
                        "external": "not a list",
                    })),
                )
                .page_with_links("https://example.com/next", Links::from_json(json!(17))),
        );
        let report = run(&fetcher, options(&[ROOT])).await;
        assert_eq!(paths(&report), vec!["/models/a.html"]);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_duplicate_seeds_are_visited_once() {
        let fetcher = Arc::new(MockFetcher::default());
        let seed = "https://example.com/models/a.html";
        let report = run(&fetcher, options(&[seed, "https://example.com/models/a.html#top"])).await;
        assert_eq!(report.urls(), vec![seed]);
        assert_eq!(report.visited, 1);
    }

    struct CancelAfterFirstFetch {
        inner: MockFetcher,
        token: CancellationToken,
    }

    #[async_trait]
    impl PageFetcher for CancelAfterFirstFetch {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
            self.token.cancel();
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_results() {
        let token = CancellationToken::new();
        let fetcher = Arc::new(CancelAfterFirstFetch { inner: site(), token: token.clone() });
        let report = discover(fetcher, options(&[ROOT]), &token).await;
        assert!(report.cancelled);
        assert_eq!(report.rounds, 1);
        assert_eq!(paths(&report), vec!["/models/a.html"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_between_rounds() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(ROOT, ["/one"])
                .page("https://example.com/one", ["/two"]),
        );
        let started = tokio::time::Instant::now();
        let report = run(&fetcher, options(&[ROOT]).with_rate_limit(Duration::from_secs(10))).await;
        assert_eq!(report.rounds, 3);
        assert_eq!(started.elapsed().as_secs(), 20);
    }

    #[rstest]
    #[case(&[], true)]
    #[case(&["not a url"], false)]
    #[case(&["mailto:sales@example.com"], false)]
    fn test_invalid_seeds(#[case] seeds: &[&str], #[case] empty: bool) {
        let err = DiscoverOptions::new(seeds, UrlMatcher::default()).unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(matches!(&*err, ErrorKind::NoSeeds), empty);
    }

    #[test]
    fn test_default_options() {
        let options = DiscoverOptions::new(["https://www.BMW.de/de/index.html"], UrlMatcher::default()).unwrap();
        assert_eq!(options.domain, "www.bmw.de");
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(options.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(options.with_concurrency(0).concurrency, 1);
    }
}
