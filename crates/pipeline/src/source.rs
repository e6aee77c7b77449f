//! Per-source steps of a run that don't emit events themselves.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use spoor_config::SourceConfig;
use spoor_discover::{DiscoverOptions, UrlMatcher};
use spoor_track::fingerprint::from_attributes;
use spoor_track::{Attributes, Classification, Discovered, MovedItem, TrackedEntity, WriteBack};
use std::collections::HashMap;
use time::Date;

/// Discovery settings for a configured source.
pub fn discover_options(source: &SourceConfig) -> Result<DiscoverOptions> {
    let slug = source.slug();
    let crawl = &source.crawl;
    let matcher =
        UrlMatcher::parse(&crawl.patterns, &crawl.anti_patterns).or_raise(|| ErrorKind::Source(slug.clone()))?;
    let options = DiscoverOptions::new(source.start_urls(), matcher)
        .or_raise(|| ErrorKind::Source(slug.clone()))?
        .with_max_depth(crawl.max_depth)
        .with_max_pages(crawl.max_pages)
        .with_concurrency(crawl.concurrency)
        .with_rate_limit(crawl.rate_limit());
    Ok(match source.domain() {
        Some(domain) => options.with_domain(domain),
        None => options,
    })
}

/// Pair discovered URLs with the attributes of the entity currently living
/// there, so an entity keyed by its attributes keeps its fingerprint.
///
/// Only entities whose fingerprint *is* their attribute fingerprint give a
/// hint; for the rest, a hint would change the key they're found under.
pub fn with_hints(urls: &[String], persisted: &[TrackedEntity]) -> Vec<Discovered> {
    let hints: HashMap<&str, &Attributes> = persisted
        .iter()
        .filter(|entity| from_attributes(&entity.attributes).as_ref() == Some(&entity.fingerprint))
        .map(|entity| (entity.current_url.as_str(), &entity.attributes))
        .collect();
    urls.iter()
        .map(|url| match hints.get(url.as_str()) {
            Some(&attributes) => Discovered::new(url.as_str()).with_attributes(attributes.clone()),
            None => Discovered::new(url.as_str()),
        })
        .collect()
}

/// Plan the write-back for a source whose new items were extracted.
///
/// An extracted item can turn out to be an entity the source already tracks
/// (it moved to a URL nothing hinted at). It's recorded as a move, or as an
/// observation if the URL didn't change, instead of a second insert; and
/// if its old URL was reported as disappeared, it isn't retired after all.
pub fn plan_with_extractions(
    classification: &Classification,
    persisted: &[TrackedEntity],
    extracted: Vec<TrackedEntity>,
    date: Date,
) -> WriteBack {
    let known: HashMap<_, _> = persisted.iter().map(|entity| (&entity.fingerprint, entity)).collect();
    let mut plan = WriteBack::new(classification, date).with_inserts(Vec::new());
    for entity in extracted {
        let fingerprint = &entity.fingerprint;
        let claimed = plan.inserts.iter().any(|insert| &insert.fingerprint == fingerprint)
            || plan.moves.iter().any(|moved| &moved.fingerprint == fingerprint)
            || plan.observed.contains(fingerprint);
        if claimed {
            tracing::warn!(%fingerprint, url = %entity.current_url, "Extracted item collides with another item; skipped");
            continue;
        }
        let Some(existing) = known.get(fingerprint) else {
            plan.inserts.push(entity);
            continue;
        };
        plan.retired.retain(|retired| retired != fingerprint);
        if existing.current_url == entity.current_url {
            plan.observed.push(entity.fingerprint);
        } else {
            tracing::info!(%fingerprint, old_url = %existing.current_url, new_url = %entity.current_url, "Extraction revealed a move");
            plan.moves.push(MovedItem {
                fingerprint: entity.fingerprint.clone(),
                old_url: existing.current_url.clone(),
                new_url: entity.current_url,
                attributes: existing.attributes.clone(),
            });
        }
    }
    plan
}
