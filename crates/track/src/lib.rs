//! Stable identity and change classification for discovered pages.
//!
//! A discovery pass produces a list of URLs. Each URL is given a
//! [`Fingerprint`] (from structured [`Attributes`] when an item has already
//! been extracted, otherwise from the shape of its URL) and the
//! [`ChangeDetector`] compares those fingerprints against the persisted
//! [`TrackedEntity`] snapshot of the same source.
//!
//! Nothing in this crate performs I/O. Writing a [`Classification`] back to
//! storage is described by a [`WriteBack`] plan and applied by the store.

mod attributes;
mod detect;
mod entity;
pub mod error;
pub mod fingerprint;
mod writeback;

pub use crate::attributes::{AttributeValue, Attributes};
pub use crate::detect::{
    ChangeDetector, Classification, Discovered, DisappearedItem, ExistingItem, MovedItem, NewItem,
};
pub use crate::entity::{Status, TrackedEntity};
pub use crate::fingerprint::Fingerprint;
pub use crate::writeback::WriteBack;
