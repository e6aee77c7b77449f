//! Deterministic identity keys for tracked items.
//!
//! Two strategies exist, tried in order:
//!
//! 1. **Attributes**: `group`, `item`, `variant` and `version` are lowercased
//!    and joined with `_`. Text repeated from the group is removed from the
//!    item, and text repeated from the group or item is removed from the
//!    variant (so "BMW" / "BMW iX" / "iX xDrive50" becomes `bmw_ix_xdrive50`
//!    rather than `bmw_bmw_ix_ix_xdrive50`).
//! 2. **URL**: boilerplate path segments (locales, "models", "technical data",
//!    bare extensions) are dropped and the remainder is joined with `_`,
//!    prefixed by the source slug.
//!
//! Both strategies only keep `[a-z0-9_]`; whitespace inside an attribute is
//! removed rather than turned into an underscore.
//!
//! # Known limitation
//!
//! The repeated-text removal is plain substring replacement. Names that
//! contain each other in unexpected places get truncated ("Ceed" removes the
//! middle of "ProCeed GT", yielding `kia_ceed_progt`), and two distinct items
//! can collapse to the same fingerprint. Changing the heuristic changes the
//! identity of everything already persisted, so it is kept as-is.

use crate::attributes::Attributes;
use derive_more::Display;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Sentinel returned when no strategy yields a usable key.
pub const UNKNOWN: &str = "unknown";

/// Path segments that say nothing about which item a page describes.
const NOISE_SEGMENTS: &[&str] = &[
    "technische-daten",
    "technical-data",
    "neufahrzeuge",
    "new-vehicles",
    "modelle",
    "models",
    "de",
    "en",
    "fr",
    "it",
    "passengercars",
    "cars",
    "html",
    "htm",
];

static NON_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").unwrap());
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Stable identity key of a tracked item.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprints loaded back from storage are trusted as-is.
impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn collapse(value: &str) -> String {
    UNDERSCORES.replace_all(value, "_").trim_matches('_').to_string()
}

fn squash(value: &str) -> String {
    collapse(&NON_IDENTIFIER.replace_all(value, ""))
}

/// Attribute-based fingerprint, or `None` when `group` or `item` is missing
/// (or nothing survives normalization).
pub fn from_attributes(attributes: &Attributes) -> Option<Fingerprint> {
    let group = attributes.group()?.to_lowercase();
    let item = attributes.item()?.to_lowercase();
    let item = item.replace(&group, "").trim().to_string();
    let mut parts = vec![group.clone()];
    if !item.is_empty() {
        parts.push(item.clone());
    }
    if let Some(variant) = attributes.variant() {
        let mut variant = variant.to_lowercase().replace(&group, "");
        if !item.is_empty() {
            variant = variant.replace(&item, "");
        }
        let variant = variant.trim();
        if !variant.is_empty() {
            parts.push(variant.to_string());
        }
    }
    if let Some(version) = attributes.version() {
        parts.push(version.to_lowercase());
    }
    let key = squash(&parts.join("_"));
    (!key.is_empty()).then_some(Fingerprint(key))
}

/// URL-based fingerprint. Never fails; returns [`UNKNOWN`] when neither the
/// path nor the slug contribute anything.
///
/// Relative references (anything [`Url::parse`] rejects) are treated as a
/// bare path.
pub fn from_url(url: &str, source_slug: Option<&str>) -> Fingerprint {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let parts = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let mut segment = segment.to_lowercase();
            if NOISE_SEGMENTS.contains(&segment.as_str()) {
                return None;
            }
            if segment.ends_with(".html") || segment.ends_with(".htm") {
                segment = segment.replace(".html", "").replace(".htm", "");
            }
            let cleaned = squash(&segment.replace('-', "_"));
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect::<Vec<_>>();
    let mut key = parts.join("_");
    if let Some(slug) = source_slug.map(|s| squash(&s.to_lowercase().replace('-', "_")))
        && !slug.is_empty()
        && !key.starts_with(&slug)
    {
        key = format!("{slug}_{key}");
    }
    let key = collapse(&key);
    if key.is_empty() { Fingerprint::unknown() } else { Fingerprint(key) }
}

/// Fingerprint an item from whatever is known about it: attributes first,
/// then the URL, then the [`UNKNOWN`] sentinel.
pub fn fingerprint(attributes: Option<&Attributes>, url: Option<&str>, source_slug: Option<&str>) -> Fingerprint {
    attributes
        .and_then(from_attributes)
        .or_else(|| url.map(|url| from_url(url, source_slug)))
        .unwrap_or_else(Fingerprint::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "https://www.bmw.de/de/neufahrzeuge/x/ix/2022/bmw-ix-technische-daten.html",
        Some("bmw"),
        "bmw_x_ix_2022_bmw_ix_technische_daten"
    )]
    #[case(
        "https://www.audi.de/de/models/a4/a4-avant/technische-daten.html",
        Some("audi"),
        "audi_a4_a4_avant_technische_daten"
    )]
    #[case(
        "https://www.mercedes-benz.de/passengercars/models/saloon/c-class/overview.html",
        Some("mercedes-benz"),
        "mercedes_benz_saloon_c_class_overview"
    )]
    #[case("https://www.tesla.com/tesla-model-3", Some("tesla"), "tesla_model_3")]
    #[case("https://www.tesla.com/en/cars/model-y.htm?ref=nav#specs", None, "model_y")]
    #[case("/en/cars/golf.htm?x=1", None, "golf")]
    #[case("https://example.com/de/models/", Some("vw"), "vw")]
    #[case("https://example.com/de/models/", None, UNKNOWN)]
    #[case("https://example.com/", None, UNKNOWN)]
    fn test_from_url(#[case] url: &str, #[case] slug: Option<&str>, #[case] expected: &str) {
        assert_eq!(from_url(url, slug).as_str(), expected);
    }

    #[test]
    fn test_locale_variants_share_fingerprint() {
        let german = from_url("https://www.example.com/de/modelle/roadster/", Some("example"));
        let english = from_url("https://www.example.com/en/models/roadster", Some("example"));
        assert_eq!(german, english);
        assert_eq!(german.as_str(), "example_roadster");
    }

    #[rstest]
    #[case(Attributes::new("BMW", "BMW iX").with_variant("iX xDrive50").with_version("2024"), Some("bmw_ix_xdrive50_2024"))]
    #[case(Attributes::new("Audi", "A4 Avant").with_variant("40 TFSI quattro"), Some("audi_a4avant_40tfsiquattro"))]
    #[case(Attributes::new("Kia", "Ceed").with_variant("ProCeed GT"), Some("kia_ceed_progt"))]
    #[case(Attributes::new("BMW", "BMW"), Some("bmw"))]
    #[case(Attributes::new(vec!["".to_string(), "BMW".to_string()], vec!["i4".to_string()]), Some("bmw_i4"))]
    #[case(Attributes::new("BMW", "  "), None)]
    #[case(Attributes { group: Some("BMW".into()), ..Default::default() }, None)]
    #[case(Attributes::new("???", "!!!"), None)]
    fn test_from_attributes(#[case] attributes: Attributes, #[case] expected: Option<&str>) {
        assert_eq!(from_attributes(&attributes).as_ref().map(Fingerprint::as_str), expected);
    }

    #[test]
    fn test_is_deterministic() {
        let attributes = Attributes::new("Audi", "Q4 e-tron").with_variant("45 e-tron").with_version("2025");
        let url = "https://www.audi.de/de/models/q4/q4-e-tron/technische-daten.html";
        let first = fingerprint(Some(&attributes), Some(url), Some("audi"));
        for _ in 0..10 {
            assert_eq!(fingerprint(Some(&attributes), Some(url), Some("audi")), first);
        }
        let first = fingerprint(None, Some(url), Some("audi"));
        for _ in 0..10 {
            assert_eq!(fingerprint(None, Some(url), Some("audi")), first);
        }
    }

    #[test]
    fn test_prefers_attributes() {
        let attributes = Attributes::new("BMW", "i4").with_variant("eDrive40");
        let fingerprint = fingerprint(Some(&attributes), Some("https://www.bmw.de/de/i4/page.html"), Some("bmw"));
        assert_eq!(fingerprint.as_str(), "bmw_i4_edrive40");
    }

    #[test]
    fn test_falls_back_to_url_without_item() {
        let attributes = Attributes { group: Some("BMW".into()), variant: Some("M50".into()), ..Default::default() };
        let fingerprint = fingerprint(Some(&attributes), Some("https://www.bmw.de/de/models/i4/m50.html"), Some("bmw"));
        assert!(!fingerprint.is_unknown());
        assert_eq!(fingerprint.as_str(), "bmw_i4_m50");
    }

    #[test]
    fn test_slug_prefix_stays_in_alphabet() {
        let fingerprint = from_url("https://www.skoda.de/modelle/octavia", Some("škoda"));
        assert_eq!(fingerprint.as_str(), "koda_octavia");
        assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_sentinel_without_inputs() {
        assert!(fingerprint(None, None, Some("bmw")).is_unknown());
        assert!(fingerprint(Some(&Attributes::default()), None, None).is_unknown());
    }
}
