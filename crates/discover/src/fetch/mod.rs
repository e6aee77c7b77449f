//! Page fetcher trait and the shapes of what it returns.

#[cfg(feature = "http")]
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(feature = "http")]
pub use self::http::HttpFetcher;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockFetcher;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

pub type FetcherHandle = Arc<dyn PageFetcher>;

/// Fetches (and possibly renders) a single page.
///
/// Returning `Err` and returning a page with `success == false` are treated
/// the same by a discovery pass: the page has no outbound links, and the pass
/// carries on.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub content: String,
}

impl FetchedPage {
    pub fn ok(links: impl Into<Links>, content: impl Into<String>) -> Self {
        Self {
            success: true,
            error_message: None,
            links: links.into(),
            content: content.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            links: Links::default(),
            content: String::new(),
        }
    }
}

/// A single outbound link: either a bare href or an object carrying one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkEntry {
    Href(String),
    Object { href: Option<String> },
    Other(serde_json::Value),
}

impl LinkEntry {
    pub fn href(&self) -> Option<&str> {
        match self {
            Self::Href(href) | Self::Object { href: Some(href) } => Some(href.as_str()),
            _ => None,
        }
    }
}

/// A value found under a key of a grouped link collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkGroup {
    List(Vec<LinkEntry>),
    Other(serde_json::Value),
}

/// Outbound links of a page.
///
/// Renderers disagree on the shape: some return a flat list, others group
/// links by kind (`{"internal": [...], "external": [...]}`). Every list under
/// any key counts. Anything else deserializes to [`Links::Other`] and yields
/// no links rather than failing the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Links {
    Flat(Vec<LinkEntry>),
    Grouped(BTreeMap<String, LinkGroup>),
    Other(serde_json::Value),
}

impl Default for Links {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl Links {
    /// Interpret an arbitrary JSON value as a link collection.
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Every usable href, flat lists first-to-last and groups in key order.
    pub fn hrefs(&self) -> Vec<&str> {
        let entries: Box<dyn Iterator<Item = &LinkEntry>> = match self {
            Self::Flat(entries) => Box::new(entries.iter()),
            Self::Grouped(groups) => Box::new(
                groups
                    .values()
                    .filter_map(|group| match group {
                        LinkGroup::List(entries) => Some(entries),
                        LinkGroup::Other(_) => None,
                    })
                    .flatten(),
            ),
            Self::Other(_) => Box::new(std::iter::empty()),
        };
        entries.filter_map(LinkEntry::href).collect()
    }
}

impl<S: Into<String>> From<Vec<S>> for Links {
    fn from(hrefs: Vec<S>) -> Self {
        Self::Flat(hrefs.into_iter().map(|href| LinkEntry::Href(href.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_links() {
        let links = Links::from_json(json!(["/a", {"href": "/b", "text": "B"}, {"title": "no href"}, 42, "/c"]));
        assert_eq!(links.hrefs(), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_grouped_links() {
        let links = Links::from_json(json!({
            "internal": [{"href": "/a"}, "/b"],
            "external": ["https://other.example/"],
            "count": 3,
        }));
        assert_eq!(links.hrefs(), vec!["https://other.example/", "/a", "/b"]);
    }

    #[test]
    fn test_malformed_links_are_empty() {
        assert!(Links::from_json(json!("not links")).hrefs().is_empty());
        assert!(Links::from_json(json!(null)).hrefs().is_empty());
        assert!(Links::default().hrefs().is_empty());
    }

    #[test]
    fn test_page_from_json() {
        let page: FetchedPage = serde_json::from_str(r#"{"success": false, "error_message": "timeout"}"#).unwrap();
        assert_eq!(page, FetchedPage::failed("timeout"));
    }
}
