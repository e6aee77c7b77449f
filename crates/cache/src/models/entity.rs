use crate::error::{Error, ErrorKind};
use crate::models::{date_to_timestamp, timestamp_to_date};
use exn::ResultExt;
use serde_json::{from_str as from_json, to_string as to_json};
use spoor_track::{AttributeValue, Attributes, Fingerprint, Status, TrackedEntity};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntityRow {
    pub(crate) fingerprint: String,
    pub(crate) source: String,
    pub(crate) group_name: Option<String>,
    pub(crate) item: Option<String>,
    pub(crate) variant: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) current_url: String,
    pub(crate) url_history: String,
    pub(crate) first_seen: i64,
    pub(crate) last_seen: i64,
    pub(crate) last_url_change: Option<i64>,
    pub(crate) status: String,
    pub(crate) content_ref: Option<String>,
}

impl TryFrom<&TrackedEntity> for EntityRow {
    type Error = Error;
    fn try_from(entity: &TrackedEntity) -> Result<Self, Self::Error> {
        let attributes = &entity.attributes;
        Ok(Self {
            fingerprint: entity.fingerprint.to_string(),
            source: entity.source.clone(),
            group_name: attributes.group().map(str::to_string),
            item: attributes.item().map(str::to_string),
            variant: attributes.variant().map(str::to_string),
            version: attributes.version().map(str::to_string),
            current_url: entity.current_url.clone(),
            url_history: to_json(&entity.url_history).or_raise(|| ErrorKind::InvalidData("url history"))?,
            first_seen: date_to_timestamp(entity.first_seen),
            last_seen: date_to_timestamp(entity.last_seen),
            last_url_change: entity.last_url_change.map(date_to_timestamp),
            status: entity.status.as_str().to_string(),
            content_ref: entity.content_ref.clone(),
        })
    }
}

impl TryFrom<EntityRow> for TrackedEntity {
    type Error = Error;
    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            fingerprint: Fingerprint::from(row.fingerprint),
            source: row.source,
            attributes: Attributes {
                group: row.group_name.map(AttributeValue::from),
                item: row.item.map(AttributeValue::from),
                variant: row.variant.map(AttributeValue::from),
                version: row.version.map(AttributeValue::from),
            },
            current_url: row.current_url,
            url_history: from_json::<Vec<String>>(&row.url_history)
                .or_raise(|| ErrorKind::InvalidData("url history"))?,
            first_seen: timestamp_to_date(row.first_seen, "first seen")?,
            last_seen: timestamp_to_date(row.last_seen, "last seen")?,
            last_url_change: row.last_url_change.map(|ts| timestamp_to_date(ts, "last url change")).transpose()?,
            status: row.status.parse::<Status>().or_raise(|| ErrorKind::InvalidData("status"))?,
            content_ref: row.content_ref,
        })
    }
}
