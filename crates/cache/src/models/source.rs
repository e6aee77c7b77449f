use crate::error::Error;
use crate::models::{count, timestamp_to_date};
use time::Date;

/// Crawl bookkeeping for one configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub slug: String,
    pub name: String,
    pub root_url: String,
    pub first_crawled: Date,
    pub last_crawled: Date,
    /// Active entities at the time of the last crawl.
    pub total_items: u64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SourceRow {
    pub(crate) slug: String,
    pub(crate) name: String,
    pub(crate) root_url: String,
    pub(crate) first_crawled: i64,
    pub(crate) last_crawled: i64,
    pub(crate) total_items: i64,
}

impl TryFrom<SourceRow> for SourceRecord {
    type Error = Error;
    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            slug: row.slug,
            name: row.name,
            root_url: row.root_url,
            first_crawled: timestamp_to_date(row.first_crawled, "first crawled")?,
            last_crawled: timestamp_to_date(row.last_crawled, "last crawled")?,
            total_items: count(row.total_items, "total items")?,
        })
    }
}
