//! SQLite tracking store.
//!
//! The store is the durable record of every entity a discovery pass has ever
//! reported, keyed by fingerprint. It is the source of truth for change
//! detection: deleting it means every entity is reported as new again.
//!
//! # Architecture
//! The store holds three tables:
//! - **Entities**: one row per fingerprint, with its current URL, URL history
//!   and lifecycle status. Rows are never deleted, only retired.
//! - **Sources**: crawl bookkeeping per configured source.
//! - **Runs**: one summary row per run date.
//!
//! A [`WriteBack`](spoor_track::WriteBack) for a source is applied inside a
//! single transaction, so a failure part-way leaves that source exactly as it
//! was before the pass.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{RunRecord, SourceRecord};
pub use crate::repo::{Applied, Repository};
