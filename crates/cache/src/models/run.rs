use crate::error::{Error, ErrorKind};
use crate::models::{count, date_to_timestamp, timestamp_to_date};
use exn::ResultExt;
use time::Date;

/// Summary of one run, keyed by its date.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub date: Date,
    /// Sources that completed without error.
    pub sources: u32,
    pub discovered: u64,
    pub new: u64,
    pub moved: u64,
    pub disappeared: u64,
    pub extracted: u64,
    pub cost_usd: f64,
    pub duration_minutes: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RunRow {
    pub(crate) date: i64,
    pub(crate) sources: i64,
    pub(crate) total_discovered: i64,
    pub(crate) total_new: i64,
    pub(crate) total_moved: i64,
    pub(crate) total_disappeared: i64,
    pub(crate) total_extracted: i64,
    pub(crate) cost_usd: f64,
    pub(crate) duration_minutes: f64,
}

impl TryFrom<&RunRecord> for RunRow {
    type Error = Error;
    fn try_from(run: &RunRecord) -> Result<Self, Self::Error> {
        let signed = |value: u64, field: &'static str| i64::try_from(value).or_raise(|| ErrorKind::InvalidData(field));
        Ok(Self {
            date: date_to_timestamp(run.date),
            sources: i64::from(run.sources),
            total_discovered: signed(run.discovered, "total discovered")?,
            total_new: signed(run.new, "total new")?,
            total_moved: signed(run.moved, "total moved")?,
            total_disappeared: signed(run.disappeared, "total disappeared")?,
            total_extracted: signed(run.extracted, "total extracted")?,
            cost_usd: run.cost_usd,
            duration_minutes: run.duration_minutes,
        })
    }
}

impl TryFrom<RunRow> for RunRecord {
    type Error = Error;
    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            date: timestamp_to_date(row.date, "date")?,
            sources: u32::try_from(row.sources).or_raise(|| ErrorKind::InvalidData("sources"))?,
            discovered: count(row.total_discovered, "total discovered")?,
            new: count(row.total_new, "total new")?,
            moved: count(row.total_moved, "total moved")?,
            disappeared: count(row.total_disappeared, "total disappeared")?,
            extracted: count(row.total_extracted, "total extracted")?,
            cost_usd: row.cost_usd,
            duration_minutes: row.duration_minutes,
        })
    }
}
