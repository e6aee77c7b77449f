//! Scripted page fetcher for testing.

use super::{FetchedPage, Links, PageFetcher};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Page(FetchedPage),
    Error,
    Panic,
}

/// Page fetcher that serves scripted responses from memory.
///
/// URLs that were never scripted come back as unsuccessful pages (the
/// equivalent of a 404). Every fetch is logged in call order, so tests can
/// assert which pages a discovery pass actually requested.
///
/// # Examples
///
/// ```
/// use spoor_discover::{MockFetcher, PageFetcher, Url};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = MockFetcher::default()
///     .page("https://example.com/", ["/models/a.html", "/models/b.html"])
///     .failing("https://example.com/models/b.html", "HTTP 503");
/// let page = fetcher.fetch(&Url::parse("https://example.com")?).await.unwrap();
/// assert_eq!(page.links.hrefs(), vec!["/models/a.html", "/models/b.html"]);
/// assert_eq!(fetcher.fetched().await, vec!["https://example.com/"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: HashMap<String, Scripted>,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    /// Panics on an invalid URL. If test setup is wrong, then test should
    /// not pass.
    fn key(url: &str) -> String {
        match Url::parse(url) {
            Ok(url) => url.to_string(),
            Err(err) => panic!("MockFetcher: invalid URL {url}: {err}"),
        }
    }

    /// Serve a successful page with the given outbound links.
    pub fn page<S: Into<String>>(self, url: &str, links: impl IntoIterator<Item = S>) -> Self {
        let links = links.into_iter().map(Into::into).collect::<Vec<String>>();
        self.respond(url, FetchedPage::ok(links, format!("<html><title>{url}</title></html>")))
    }

    /// Serve a successful page with a raw link collection (for testing
    /// grouped or malformed shapes).
    pub fn page_with_links(self, url: &str, links: Links) -> Self {
        self.respond(url, FetchedPage::ok(links, String::new()))
    }

    /// Serve an arbitrary response.
    pub fn respond(mut self, url: &str, page: FetchedPage) -> Self {
        self.pages.insert(Self::key(url), Scripted::Page(page));
        self
    }

    /// Serve an unsuccessful page.
    pub fn failing(self, url: &str, message: &str) -> Self {
        self.respond(url, FetchedPage::failed(message))
    }

    /// Return an error instead of a page.
    pub fn erroring(mut self, url: &str) -> Self {
        self.pages.insert(Self::key(url), Scripted::Error);
        self
    }

    /// Panic while fetching, to exercise task isolation.
    pub fn panicking(mut self, url: &str) -> Self {
        self.pages.insert(Self::key(url), Scripted::Panic);
        self
    }

    /// URLs fetched so far, in call order.
    pub async fn fetched(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.log.lock().await.push(url.to_string());
        match self.pages.get(url.as_str()) {
            Some(Scripted::Page(page)) => Ok(page.clone()),
            Some(Scripted::Error) => exn::bail!(ErrorKind::Fetch(url.to_string())),
            // The panic here is DELIBERATE; it's what the test asked for.
            Some(Scripted::Panic) => panic!("MockFetcher: scripted panic for {url}"),
            None => Ok(FetchedPage::failed("not found")),
        }
    }
}
