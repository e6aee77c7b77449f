//! Files a run leaves behind for operators and downstream jobs.
//!
//! ```text
//! <output>/<date>/discovered/<slug>_urls.txt   one URL per line
//! <output>/<date>/discovered/summary.json      every source of the run
//! ```

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::Date;

pub const SUMMARY_FILE: &str = "summary.json";

/// URLs discovered for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub count: usize,
    pub urls: Vec<String>,
}

impl From<Vec<String>> for Listing {
    fn from(urls: Vec<String>) -> Self {
        Self { count: urls.len(), urls }
    }
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub date: String,
    pub sources: BTreeMap<String, Listing>,
    pub total_urls: usize,
}

impl DiscoverySummary {
    pub fn new(date: Date, sources: BTreeMap<String, Listing>) -> Self {
        let total_urls = sources.values().map(|listing| listing.count).sum();
        Self { date: date.to_string(), sources, total_urls }
    }

    /// Carry over sources from an earlier summary of the same day that this
    /// one didn't process. Listings in `self` win.
    pub fn merge(mut self, earlier: DiscoverySummary) -> Self {
        if earlier.date != self.date {
            return self;
        }
        for (slug, listing) in earlier.sources {
            self.sources.entry(slug).or_insert(listing);
        }
        self.total_urls = self.sources.values().map(|listing| listing.count).sum();
        self
    }
}

pub fn discovered_dir(output: &Path, date: Date) -> PathBuf {
    output.join(date.to_string()).join("discovered")
}

async fn write(path: PathBuf, contents: Vec<u8>) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Artifact(path.clone()))?;
    }
    tokio::fs::write(&path, contents).await.or_raise(|| ErrorKind::Artifact(path.clone()))?;
    Ok(path)
}

/// Write a source's listing, replacing any earlier listing of the same day.
pub async fn write_listing(output: &Path, date: Date, slug: &str, urls: &[String]) -> Result<PathBuf> {
    let path = discovered_dir(output, date).join(format!("{slug}_urls.txt"));
    let mut contents = urls.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    write(path, contents.into_bytes()).await
}

/// Write `summary.json`, merged with any summary already written that day
/// (e.g. by an earlier run restricted to other sources).
pub async fn write_summary(output: &Path, summary: &DiscoverySummary) -> Result<PathBuf> {
    let path = output.join(&summary.date).join("discovered").join(SUMMARY_FILE);
    let summary = match read_summary(&path).await {
        Some(earlier) => summary.clone().merge(earlier),
        None => summary.clone(),
    };
    let contents = serde_json::to_vec_pretty(&summary).or_raise(|| ErrorKind::Artifact(path.clone()))?;
    write(path, contents).await
}

async fn read_summary(path: &Path) -> Option<DiscoverySummary> {
    let contents = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&contents) {
        Ok(summary) => Some(summary),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "Replacing unreadable discovery summary");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[tokio::test]
    async fn test_listing_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let urls = vec![
            "https://www.bmw.de/de/ix.html".to_string(),
            "https://www.bmw.de/de/i4.html".to_string(),
        ];
        let listing = write_listing(dir.path(), date!(2025 - 06 - 30), "bmw", &urls).await.unwrap();
        assert_eq!(listing, dir.path().join("2025-06-30/discovered/bmw_urls.txt"));
        assert_eq!(
            tokio::fs::read_to_string(&listing).await.unwrap(),
            "https://www.bmw.de/de/ix.html\nhttps://www.bmw.de/de/i4.html\n"
        );

        let empty = write_listing(dir.path(), date!(2025 - 06 - 30), "audi", &[]).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&empty).await.unwrap(), "");

        let sources = BTreeMap::from([
            ("bmw".to_string(), Listing::from(urls)),
            ("audi".to_string(), Listing::default()),
        ]);
        let summary = DiscoverySummary::new(date!(2025 - 06 - 30), sources);
        let path = write_summary(dir.path(), &summary).await.unwrap();
        assert_eq!(path, dir.path().join("2025-06-30/discovered/summary.json"));

        let json: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(json["date"], "2025-06-30");
        assert_eq!(json["total_urls"], 2);
        assert_eq!(json["sources"]["bmw"]["count"], 2);
        assert_eq!(json["sources"]["audi"]["urls"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_summary_merges_same_day_runs() {
        let dir = tempfile::tempdir().unwrap();
        let day = date!(2025 - 06 - 30);
        let urls = |urls: &[&str]| Listing::from(urls.iter().map(|url| url.to_string()).collect::<Vec<_>>());
        let full = BTreeMap::from([
            ("bmw".to_string(), urls(&["https://www.bmw.de/de/ix.html"])),
            ("audi".to_string(), urls(&["https://www.audi.de/de/a4.html", "https://www.audi.de/de/a6.html"])),
        ]);
        write_summary(dir.path(), &DiscoverySummary::new(day, full)).await.unwrap();

        // A later run of just one source replaces that source only.
        let bmw = BTreeMap::from([(
            "bmw".to_string(),
            urls(&["https://www.bmw.de/de/ix.html", "https://www.bmw.de/de/i4.html"]),
        )]);
        let path = write_summary(dir.path(), &DiscoverySummary::new(day, bmw)).await.unwrap();
        let merged: DiscoverySummary = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(merged.sources.keys().collect::<Vec<_>>(), vec!["audi", "bmw"]);
        assert_eq!(merged.sources["bmw"].count, 2);
        assert_eq!(merged.sources["audi"].count, 2);
        assert_eq!(merged.total_urls, 4);

        // Another day starts from scratch.
        let next = DiscoverySummary::new(date!(2025 - 07 - 01), BTreeMap::new());
        let path = write_summary(dir.path(), &next).await.unwrap();
        let json: DiscoverySummary = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert!(json.sources.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_summary_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let day = date!(2025 - 06 - 30);
        let path = discovered_dir(dir.path(), day).join(SUMMARY_FILE);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let summary = DiscoverySummary::new(day, BTreeMap::from([("bmw".to_string(), Listing::default())]));
        write_summary(dir.path(), &summary).await.unwrap();
        let json: DiscoverySummary = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(json, summary);
    }
}
