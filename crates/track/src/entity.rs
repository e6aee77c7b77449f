use crate::attributes::Attributes;
use crate::error::{Error, ErrorKind};
use crate::fingerprint::Fingerprint;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::Date;

/// Lifecycle status of a tracked entity. Entities are never deleted, only
/// retired.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[display("active")]
    Active,
    #[display("disappeared")]
    Disappeared,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disappeared => "disappeared",
        }
    }
}

impl FromStr for Status {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "disappeared" => Ok(Self::Disappeared),
            other => exn::bail!(ErrorKind::UnknownStatus(other.to_string())),
        }
    }
}

/// The persisted record of one logical item across discovery passes.
///
/// `url_history` holds every URL the entity was previously found at, oldest
/// first, and never contains `current_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    pub fingerprint: Fingerprint,
    pub source: String,
    pub attributes: Attributes,
    pub current_url: String,
    pub url_history: Vec<String>,
    pub first_seen: Date,
    pub last_seen: Date,
    pub last_url_change: Option<Date>,
    pub status: Status,
    /// Opaque pointer to extracted content (an archive path, object key, ...).
    pub content_ref: Option<String>,
}

impl TrackedEntity {
    /// A freshly discovered, active entity.
    pub fn new(fingerprint: Fingerprint, source: impl Into<String>, url: impl Into<String>, date: Date) -> Self {
        Self {
            fingerprint,
            source: source.into(),
            attributes: Attributes::default(),
            current_url: url.into(),
            url_history: Vec::new(),
            first_seen: date,
            last_seen: date,
            last_url_change: None,
            status: Status::Active,
            content_ref: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Move the entity to a new URL.
    ///
    /// The previous URL is appended to the history (once), and the new URL
    /// is removed from it in case the item moved back to an old location.
    /// Returns `false`, and only refreshes `last_seen`, when the URL is
    /// unchanged.
    pub fn relocate(&mut self, new_url: &str, date: Date) -> bool {
        if self.current_url == new_url {
            self.observe(date);
            return false;
        }
        let previous = std::mem::replace(&mut self.current_url, new_url.to_string());
        if !self.url_history.contains(&previous) {
            self.url_history.push(previous);
        }
        self.url_history.retain(|url| url != new_url);
        self.last_seen = date;
        self.last_url_change = Some(date);
        self.status = Status::Active;
        true
    }

    /// Seen again at the same URL. Reactivates a disappeared entity.
    pub fn observe(&mut self, date: Date) {
        self.last_seen = date;
        self.status = Status::Active;
    }

    pub fn retire(&mut self) {
        self.status = Status::Disappeared;
    }
}
