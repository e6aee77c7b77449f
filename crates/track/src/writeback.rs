use crate::detect::{Classification, MovedItem};
use crate::entity::TrackedEntity;
use crate::fingerprint::Fingerprint;
use time::Date;

/// Everything a store needs to bring one source in line with a
/// [`Classification`], applied as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBack {
    pub source: String,
    pub date: Date,
    /// Upserted as-is.
    pub inserts: Vec<TrackedEntity>,
    /// Patched with [`TrackedEntity::relocate`].
    pub moves: Vec<MovedItem>,
    /// Patched with [`TrackedEntity::observe`].
    pub observed: Vec<Fingerprint>,
    /// Patched with [`TrackedEntity::retire`].
    pub retired: Vec<Fingerprint>,
}

impl WriteBack {
    /// Plan a write-back where every new item is tracked under the
    /// fingerprint it was discovered with.
    pub fn new(classification: &Classification, date: Date) -> Self {
        let inserts = classification
            .new
            .iter()
            .map(|item| {
                let entity = TrackedEntity::new(item.fingerprint.clone(), &classification.source, &item.url, date);
                match &item.attributes {
                    Some(attributes) => entity.with_attributes(attributes.primaries()),
                    None => entity,
                }
            })
            .collect();
        Self {
            source: classification.source.clone(),
            date,
            inserts,
            moves: classification.moved.clone(),
            observed: classification.existing.iter().map(|item| item.fingerprint.clone()).collect(),
            retired: classification.disappeared.iter().map(|item| item.fingerprint.clone()).collect(),
        }
    }

    /// Replace the planned inserts, for callers that extracted the new items
    /// and re-fingerprinted them from their attributes.
    pub fn with_inserts(mut self, inserts: Vec<TrackedEntity>) -> Self {
        self.inserts = inserts;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.moves.is_empty() && self.observed.is_empty() && self.retired.is_empty()
    }
}
