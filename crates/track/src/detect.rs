//! Classification of a discovery pass against persisted state.

use crate::attributes::Attributes;
use crate::entity::{Status, TrackedEntity};
use crate::fingerprint::{self, Fingerprint};
use std::collections::HashMap;
use tracing::instrument;

/// A URL found during discovery, optionally with identity attributes that
/// are already known for it (e.g. from a previous extraction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub url: String,
    pub attributes: Option<Attributes>,
}

impl Discovered {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), attributes: None }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

impl From<&str> for Discovered {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}
impl From<String> for Discovered {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Fingerprint never seen before for this source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub fingerprint: Fingerprint,
    pub url: String,
    pub attributes: Option<Attributes>,
}

/// Known fingerprint, found at its current URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingItem {
    pub fingerprint: Fingerprint,
    pub url: String,
}

/// Known fingerprint, found at a different URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedItem {
    pub fingerprint: Fingerprint,
    pub old_url: String,
    pub new_url: String,
    /// Attributes on record, for reporting.
    pub attributes: Attributes,
}

/// Active entity that was not found during this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisappearedItem {
    pub fingerprint: Fingerprint,
    pub url: String,
    pub attributes: Attributes,
}

/// Four-way result of comparing one source's discovery pass against its
/// persisted entities. The buckets are disjoint.
///
/// Bucket order follows discovery order (or persisted order for
/// `disappeared`), but callers should only rely on bucket contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub source: String,
    pub new: Vec<NewItem>,
    pub existing: Vec<ExistingItem>,
    pub moved: Vec<MovedItem>,
    pub disappeared: Vec<DisappearedItem>,
}

impl Classification {
    /// `true` if nothing needs to be extracted, moved or retired.
    pub fn is_unchanged(&self) -> bool {
        self.new.is_empty() && self.moved.is_empty() && self.disappeared.is_empty()
    }

    /// Number of distinct fingerprints found during the pass.
    pub fn discovered(&self) -> usize {
        self.new.len() + self.existing.len() + self.moved.len()
    }
}

/// Pure, per-source change detection.
///
/// No I/O happens here: the caller loads the persisted snapshot, and applies
/// the resulting [`Classification`] afterwards.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    source: String,
}

impl ChangeDetector {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The fingerprint a discovered URL is classified under.
    pub fn fingerprint(&self, discovered: &Discovered) -> Fingerprint {
        fingerprint::fingerprint(discovered.attributes.as_ref(), Some(&discovered.url), Some(&self.source))
    }

    /// Classify `discovered` against the `persisted` entities of this source.
    ///
    /// If two discovered URLs share a fingerprint, the later one wins. That's
    /// a collision, and it is logged rather than resolved.
    #[instrument(skip_all, fields(source = %self.source))]
    pub fn detect(&self, discovered: &[Discovered], persisted: &[TrackedEntity]) -> Classification {
        let mut slots: Vec<(Fingerprint, &Discovered)> = Vec::with_capacity(discovered.len());
        let mut index: HashMap<Fingerprint, usize> = HashMap::with_capacity(discovered.len());
        for item in discovered {
            let fingerprint = self.fingerprint(item);
            match index.get(&fingerprint) {
                Some(&slot) => {
                    tracing::warn!(
                        %fingerprint,
                        replaced = %slots[slot].1.url,
                        url = %item.url,
                        "Fingerprint collision; keeping the later URL"
                    );
                    slots[slot].1 = item;
                },
                None => {
                    index.insert(fingerprint.clone(), slots.len());
                    slots.push((fingerprint, item));
                },
            }
        }

        let known = persisted.iter().map(|entity| (&entity.fingerprint, entity)).collect::<HashMap<_, _>>();
        let mut result = Classification { source: self.source.clone(), ..Classification::default() };
        for (fingerprint, item) in slots {
            match known.get(&fingerprint) {
                Some(entity) if entity.current_url == item.url => {
                    result.existing.push(ExistingItem { fingerprint, url: item.url.clone() });
                },
                Some(entity) => result.moved.push(MovedItem {
                    fingerprint,
                    old_url: entity.current_url.clone(),
                    new_url: item.url.clone(),
                    attributes: entity.attributes.clone(),
                }),
                None => result.new.push(NewItem {
                    fingerprint,
                    url: item.url.clone(),
                    attributes: item.attributes.clone(),
                }),
            }
        }
        result.disappeared = persisted
            .iter()
            .filter(|entity| entity.status == Status::Active && !index.contains_key(&entity.fingerprint))
            .map(|entity| DisappearedItem {
                fingerprint: entity.fingerprint.clone(),
                url: entity.current_url.clone(),
                attributes: entity.attributes.clone(),
            })
            .collect();

        tracing::info!(
            new = result.new.len(),
            existing = result.existing.len(),
            moved = result.moved.len(),
            disappeared = result.disappeared.len(),
            "Classified discovery pass"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const URL_A1: &str = "https://example.com/models/alpha";
    const URL_B1: &str = "https://example.com/de/models/bravo";
    const URL_B2: &str = "https://example.com/en/models/bravo";
    const URL_C1: &str = "https://example.com/models/charlie";
    const URL_D1: &str = "https://example.com/models/delta";

    fn persisted(detector: &ChangeDetector, url: &str) -> TrackedEntity {
        let fingerprint = detector.fingerprint(&Discovered::new(url));
        TrackedEntity::new(fingerprint, detector.source(), url, date!(2025 - 01 - 01))
    }

    fn fingerprints<'a>(items: impl IntoIterator<Item = &'a Fingerprint>) -> Vec<&'a str> {
        let mut out = items.into_iter().map(Fingerprint::as_str).collect::<Vec<_>>();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_four_way_classification() {
        let detector = ChangeDetector::new("example");
        let discovered = [URL_A1, URL_B2, URL_C1].map(Discovered::from);
        let snapshot = [URL_A1, URL_B1, URL_D1].map(|url| persisted(&detector, url));

        let result = detector.detect(&discovered, &snapshot);
        assert_eq!(fingerprints(result.new.iter().map(|i| &i.fingerprint)), vec!["example_charlie"]);
        assert_eq!(fingerprints(result.existing.iter().map(|i| &i.fingerprint)), vec!["example_alpha"]);
        assert_eq!(fingerprints(result.disappeared.iter().map(|i| &i.fingerprint)), vec!["example_delta"]);
        assert_eq!(result.moved.len(), 1);
        assert_eq!(result.moved[0].fingerprint.as_str(), "example_bravo");
        assert_eq!(result.moved[0].old_url, URL_B1);
        assert_eq!(result.moved[0].new_url, URL_B2);
        assert_eq!(result.disappeared[0].url, URL_D1);
        assert!(!result.is_unchanged());
        assert_eq!(result.discovered(), 3);
    }

    #[test]
    fn test_steady_state_is_idempotent() {
        let detector = ChangeDetector::new("example");
        let discovered = [URL_A1, URL_C1].map(Discovered::from);
        let mut snapshot = [URL_A1, URL_C1, URL_D1].map(|url| persisted(&detector, url));
        snapshot[2].retire();

        let first = detector.detect(&discovered, &snapshot);
        let second = detector.detect(&discovered, &snapshot);
        assert_eq!(first, second);
        assert!(first.new.is_empty());
        assert!(first.moved.is_empty());
        assert!(first.disappeared.is_empty());
        assert_eq!(first.existing.len(), discovered.len());
        assert!(first.is_unchanged());
    }

    #[test]
    fn test_disappeared_entities_are_not_reported_again() {
        let detector = ChangeDetector::new("example");
        let mut gone = persisted(&detector, URL_D1);
        gone.retire();
        let active = persisted(&detector, URL_A1);

        let result = detector.detect(&[], &[gone, active]);
        assert_eq!(fingerprints(result.disappeared.iter().map(|i| &i.fingerprint)), vec!["example_alpha"]);
    }

    #[test]
    fn test_reappearing_entity_is_classified_by_url() {
        let detector = ChangeDetector::new("example");
        let mut gone = persisted(&detector, URL_B1);
        gone.retire();

        let result = detector.detect(&[Discovered::from(URL_B1)], std::slice::from_ref(&gone));
        assert_eq!(result.existing.len(), 1);
        let result = detector.detect(&[Discovered::from(URL_B2)], std::slice::from_ref(&gone));
        assert_eq!(result.moved.len(), 1);
        assert!(result.new.is_empty());
    }

    #[test]
    fn test_collision_keeps_later_url() {
        let detector = ChangeDetector::new("example");
        let discovered = [URL_B1, URL_B2].map(Discovered::from);

        let result = detector.detect(&discovered, &[]);
        assert_eq!(result.new.len(), 1);
        assert_eq!(result.new[0].url, URL_B2);
    }

    #[test]
    fn test_attributes_survive_url_restructuring() {
        let detector = ChangeDetector::new("bmw");
        let attributes = Attributes::new("BMW", "iX").with_variant("xDrive50");
        let old = Discovered::new("https://www.bmw.de/de/neufahrzeuge/ix.html").with_attributes(attributes.clone());
        let entity = TrackedEntity::new(detector.fingerprint(&old), "bmw", &old.url, date!(2025 - 01 - 01))
            .with_attributes(attributes.clone());

        let restructured = Discovered::new("https://www.bmw.de/de/all-models/bev/ix/2025/overview.html")
            .with_attributes(attributes.clone());
        let result = detector.detect(&[restructured], &[entity]);
        assert_eq!(result.moved.len(), 1);
        assert_eq!(result.moved[0].fingerprint.as_str(), "bmw_ix_xdrive50");
        assert_eq!(result.moved[0].attributes, attributes);
    }
}
