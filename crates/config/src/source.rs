use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// One site to discover pages on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name, e.g. `BMW`.
    pub name: String,
    /// Short identifier used for storage, artifact names and URL
    /// fingerprints. Derived from `name` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub root_url: String,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

/// Discovery settings for a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Seed URLs. Defaults to the source's `root_url`.
    pub start_urls: Vec<String>,
    /// URLs to report. Prefixed with `re:`, `contains:` or `glob:` (the
    /// default).
    pub patterns: Vec<String>,
    /// URLs never to report, even if a pattern matches.
    pub anti_patterns: Vec<String>,
    pub max_depth: u32,
    pub max_pages: usize,
    pub concurrency: usize,
    /// Pause between crawl rounds, in seconds.
    pub rate_limit_seconds: f64,
    /// Links are only followed if their host contains this. Defaults to the
    /// host of `root_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            patterns: Vec::new(),
            anti_patterns: Vec::new(),
            max_depth: 3,
            max_pages: 500,
            concurrency: 5,
            rate_limit_seconds: 1.0,
            domain: None,
        }
    }
}

impl CrawlConfig {
    /// Panics if the rate limit is negative, infinite or too large for a
    /// [`Duration`]; [`Config::load`](crate::Config::load) rejects those.
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_seconds)
    }
}

/// ASCII slug of a source name: transliterated, lowercased, with every run
/// of other characters collapsed to a single `-`.
pub fn slugify(name: &str) -> String {
    rslug::slugify!(name)
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, root_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            root_url: root_url.into(),
            crawl: CrawlConfig::default(),
        }
    }

    pub fn slug(&self) -> String {
        match &self.slug {
            Some(slug) => slug.clone(),
            None => slugify(&self.name),
        }
    }

    pub fn start_urls(&self) -> Vec<String> {
        if self.crawl.start_urls.is_empty() {
            vec![self.root_url.clone()]
        } else {
            self.crawl.start_urls.clone()
        }
    }

    /// The configured domain filter, or the host of `root_url` (or nothing,
    /// if that doesn't parse).
    pub fn domain(&self) -> Option<String> {
        if let Some(domain) = &self.crawl.domain {
            return Some(domain.clone());
        }
        Url::parse(&self.root_url).ok()?.host_str().map(str::to_string)
    }
}
