//! Structured extraction of newly discovered items.

use crate::error::{Error, ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use spoor_discover::{FetcherHandle, Url};
use spoor_track::fingerprint::fingerprint;
use spoor_track::{Attributes, Fingerprint, NewItem, TrackedEntity};
use std::sync::Arc;
use time::Date;

pub type ExtractorHandle = Arc<dyn Extractor>;

/// Turns the content of a newly discovered page into identity attributes.
///
/// Extraction is usually the expensive step of a run (a paid API call per
/// page), which is why it only ever sees items classified as new.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &str, content: &str) -> Result<Extraction>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Item {
        attributes: Attributes,
        /// Where the extracted content was stored, if anywhere.
        content_ref: Option<String>,
        cost_usd: f64,
    },
    /// The page matched the patterns but isn't one of the source's items
    /// (an overview or comparison page). It stays untracked.
    NotASource,
}

/// What happened to one new item.
#[derive(Debug)]
pub enum ItemOutcome {
    Tracked { fingerprint: Fingerprint, cost_usd: f64 },
    NotASource,
    /// The item stays untracked and is reported as new again next run.
    Failed(Error),
}

/// Fetch a new item's page and extract it into an entity, fingerprinted
/// from its attributes.
pub(crate) async fn extract_item(
    fetcher: &FetcherHandle,
    extractor: &dyn Extractor,
    slug: &str,
    item: &NewItem,
    date: Date,
) -> Result<Option<(TrackedEntity, f64)>> {
    let url = Url::parse(&item.url).or_raise(|| ErrorKind::Extract(item.url.clone()))?;
    let page = fetcher.fetch(&url).await.or_raise(|| ErrorKind::Extract(item.url.clone()))?;
    if !page.success {
        let reason = page.error_message.as_deref().unwrap_or("unsuccessful fetch");
        exn::bail!(ErrorKind::Extract(format!("{}: {reason}", item.url)));
    }
    match extractor.extract(&item.url, &page.content).await? {
        Extraction::NotASource => Ok(None),
        Extraction::Item { attributes, content_ref, cost_usd } => {
            let fingerprint = fingerprint(Some(&attributes), Some(&item.url), Some(slug));
            let mut entity = TrackedEntity::new(fingerprint, slug, &item.url, date).with_attributes(attributes.primaries());
            entity.content_ref = content_ref;
            Ok(Some((entity, cost_usd)))
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use spoor_discover::MockFetcher;
    use std::collections::HashMap;
    use time::macros::date;

    /// Extractor answering from a fixed table; URLs not in it fail.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedExtractor {
        answers: HashMap<String, Extraction>,
    }

    impl ScriptedExtractor {
        pub(crate) fn item(mut self, url: &str, attributes: Attributes) -> Self {
            let extraction = Extraction::Item { attributes, content_ref: None, cost_usd: 0.006 };
            self.answers.insert(url.to_string(), extraction);
            self
        }

        pub(crate) fn not_a_source(mut self, url: &str) -> Self {
            self.answers.insert(url.to_string(), Extraction::NotASource);
            self
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        async fn extract(&self, url: &str, _content: &str) -> Result<Extraction> {
            match self.answers.get(url) {
                Some(extraction) => Ok(extraction.clone()),
                None => exn::bail!(ErrorKind::Extract(url.to_string())),
            }
        }
    }

    const URL: &str = "https://www.kia.com/de/modelle/ceed/technische-daten.html";

    fn new_item(url: &str) -> NewItem {
        NewItem {
            fingerprint: Fingerprint::from(format!("url-{url}")),
            url: url.to_string(),
            attributes: None,
        }
    }

    #[tokio::test]
    async fn test_item_is_fingerprinted_from_attributes() {
        let fetcher: FetcherHandle = Arc::new(MockFetcher::default().page(URL, Vec::<String>::new()));
        let extractor = ScriptedExtractor::default()
            .item(URL, Attributes::new("Kia", vec![" ".to_string(), "Ceed".to_string()]).with_variant("GT"));
        let (entity, cost) = extract_item(&fetcher, &extractor, "kia", &new_item(URL), date!(2025 - 03 - 01))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.fingerprint.as_str(), "kia_ceed_gt");
        assert_eq!(entity.attributes, Attributes::new("Kia", "Ceed").with_variant("GT"));
        assert_eq!(entity.current_url, URL);
        assert_eq!(entity.first_seen, date!(2025 - 03 - 01));
        assert_eq!(cost, 0.006);
    }

    #[tokio::test]
    async fn test_not_a_source() {
        let fetcher: FetcherHandle = Arc::new(MockFetcher::default().page(URL, Vec::<String>::new()));
        let extractor = ScriptedExtractor::default().not_a_source(URL);
        let extracted = extract_item(&fetcher, &extractor, "kia", &new_item(URL), date!(2025 - 03 - 01)).await;
        assert!(extracted.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_an_extraction_error() {
        let fetcher: FetcherHandle = Arc::new(MockFetcher::default().failing(URL, "HTTP 503"));
        let extractor = ScriptedExtractor::default().not_a_source(URL);
        let err = extract_item(&fetcher, &extractor, "kia", &new_item(URL), date!(2025 - 03 - 01))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Extract(reason) if reason.ends_with("HTTP 503")));
    }
}
