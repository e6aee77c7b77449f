//! Plain HTTP page fetcher. No JavaScript is executed, so pages that build
//! their navigation client-side will come back with few or no links.

use super::{FetchedPage, PageFetcher};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("spoor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .or_raise(|| ErrorKind::Network)?;
        Ok(Self { client })
    }
}

/// Absolute hrefs of every anchor, resolved against the final (post-redirect)
/// URL of the page.
fn extract_links(base: &Url, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect()
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .or_raise(|| ErrorKind::Fetch(url.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Ok(FetchedPage::failed(format!("HTTP {status}")));
        }
        let base = response.url().clone();
        let content = response.text().await.or_raise(|| ErrorKind::Fetch(url.to_string()))?;
        let links = extract_links(&base, &content);
        Ok(FetchedPage::ok(links, content))
    }
}
