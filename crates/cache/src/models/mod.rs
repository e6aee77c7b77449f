mod entity;
mod run;
mod source;

pub(crate) use self::entity::EntityRow;
pub use self::run::RunRecord;
pub(crate) use self::run::RunRow;
pub use self::source::SourceRecord;
pub(crate) use self::source::SourceRow;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::{Date, UtcDateTime};

/// Dates are stored as the unix timestamp of their UTC midnight.
pub(crate) fn date_to_timestamp(date: Date) -> i64 {
    date.midnight().as_utc().unix_timestamp()
}

pub(crate) fn timestamp_to_date(timestamp: i64, field: &'static str) -> Result<Date> {
    Ok(UtcDateTime::from_unix_timestamp(timestamp).or_raise(|| ErrorKind::InvalidData(field))?.date())
}

pub(crate) fn count(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}
