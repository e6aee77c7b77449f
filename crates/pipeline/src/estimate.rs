use spoor_track::Classification;
use std::time::Duration;

/// Typical cost of extracting one item, in US dollars.
pub const COST_PER_ITEM_USD: f64 = 0.006;
/// Typical wall-clock time of extracting one item.
pub const TIME_PER_ITEM: Duration = Duration::from_secs(10);

/// Projected cost of extracting a classification's new items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub items: usize,
    pub cost_usd: f64,
    pub duration: Duration,
}

pub fn estimate(classification: &Classification) -> Estimate {
    let items = classification.new.len();
    Estimate {
        items,
        cost_usd: items as f64 * COST_PER_ITEM_USD,
        duration: TIME_PER_ITEM * u32::try_from(items).unwrap_or(u32::MAX),
    }
}
