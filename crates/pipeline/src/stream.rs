use crate::artifacts::{DiscoverySummary, Listing, write_listing, write_summary};
use crate::error::{Error, ErrorKind, Result};
use crate::estimate::{Estimate, estimate};
use crate::extract::{ItemOutcome, extract_item};
use crate::source::{discover_options, plan_with_extractions, with_hints};
use crate::{Context, Stage};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use spoor_cache::{Applied, Repository, RunRecord};
use spoor_config::SourceConfig;
use spoor_discover::{DiscoveryReport, Frontier};
use spoor_track::{ChangeDetector, Classification, TrackedEntity, WriteBack};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use time::Date;
use tokio::time::Instant;
use tracing::instrument;

/// Progress events emitted by [`run`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. Per source, [`SourceStarted`](Self::SourceStarted) followed by as many
///    of [`Discovered`](Self::Discovered), [`Classified`](Self::Classified),
///    [`Extracted`](Self::Extracted) (once per new item) and
///    [`Applied`](Self::Applied) as the [`Stage`] reaches. A failing source
///    ends its sequence with [`SourceFailed`](Self::SourceFailed) instead.
/// 3. [`Complete`](Self::Complete), exactly once.
///
/// An `Err` item (a run-level failure) ends the stream without `Complete`.
#[derive(Debug)]
pub enum RunEvent {
    Started {
        date: Date,
        stage: Stage,
        sources: usize,
    },
    SourceStarted {
        slug: String,
        name: String,
    },
    Discovered {
        slug: String,
        report: Box<DiscoveryReport>,
        listing: PathBuf,
    },
    Classified {
        slug: String,
        classification: Box<Classification>,
        estimate: Estimate,
    },
    Extracted {
        slug: String,
        url: String,
        outcome: ItemOutcome,
    },
    Applied {
        slug: String,
        applied: Applied,
    },
    SourceFailed {
        slug: String,
        error: Error,
    },
    Complete(Box<RunSummary>),
}

/// Totals of a run, across every source that got far enough to count.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub date: Date,
    pub stage: Stage,
    pub succeeded: usize,
    pub failed: usize,
    pub discovered: usize,
    pub new: usize,
    pub moved: usize,
    pub disappeared: usize,
    pub extracted: usize,
    pub cost_usd: f64,
    pub duration: Duration,
    pub cancelled: bool,
    /// Location of `summary.json`.
    pub summary: PathBuf,
}

impl RunSummary {
    fn new(date: Date, stage: Stage) -> Self {
        Self {
            date,
            stage,
            succeeded: 0,
            failed: 0,
            discovered: 0,
            new: 0,
            moved: 0,
            disappeared: 0,
            extracted: 0,
            cost_usd: 0.0,
            duration: Duration::ZERO,
            cancelled: false,
            summary: PathBuf::new(),
        }
    }

    fn count(&mut self, classification: &Classification) {
        self.new += classification.new.len();
        self.moved += classification.moved.len();
        self.disappeared += classification.disappeared.len();
    }

    fn record(&self) -> RunRecord {
        RunRecord {
            date: self.date,
            sources: u32::try_from(self.succeeded).unwrap_or(u32::MAX),
            discovered: self.discovered as u64,
            new: self.new as u64,
            moved: self.moved as u64,
            disappeared: self.disappeared as u64,
            extracted: self.extracted as u64,
            cost_usd: self.cost_usd,
            duration_minutes: self.duration.as_secs_f64() / 60.0,
        }
    }
}

/// Streams [`RunEvent`]s while processing `sources` in order, as far as the
/// context's [`Stage`] goes.
///
/// Sources are processed one at a time with a pause between them. Each
/// source's write-back is a single transaction, so a source that fails
/// part-way is left as it was.
pub fn run<'a>(ctx: &'a Context, sources: &'a [SourceConfig]) -> impl Stream<Item = Result<RunEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let started = Instant::now();
        yield Ok(RunEvent::Started { date: ctx.date, stage: ctx.stage, sources: sources.len() });
        let repository = match (&ctx.repository, ctx.stage.needs_store()) {
            (_, false) => None,
            (Some(repository), true) => Some(repository),
            (None, true) => {
                yield Err(exn::Exn::from(ErrorKind::StoreRequired));
                return;
            },
        };

        let mut summary = RunSummary::new(ctx.date, ctx.stage);
        let mut listings = BTreeMap::new();
        for (index, source) in sources.iter().enumerate() {
            if (index > 0 && pause(ctx).await) || ctx.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let slug = source.slug();
            yield Ok(RunEvent::SourceStarted { slug: slug.clone(), name: source.name.clone() });

            let (report, listing) = match discover_source(ctx, source, &slug).await {
                Ok(discovered) => discovered,
                Err(error) => {
                    summary.failed += 1;
                    yield Ok(RunEvent::SourceFailed { slug, error });
                    continue;
                },
            };
            let urls = report.urls();
            let cancelled = report.cancelled;
            summary.discovered += urls.len();
            listings.insert(slug.clone(), Listing::from(urls.clone()));
            yield Ok(RunEvent::Discovered { slug: slug.clone(), report: Box::new(report), listing });
            if cancelled {
                // A partial pass would retire everything it didn't get to.
                summary.cancelled = true;
                summary.failed += 1;
                let error = exn::Exn::from(ErrorKind::Cancelled(slug.clone()));
                yield Ok(RunEvent::SourceFailed { slug, error });
                break;
            }
            let Some(repository) = repository else {
                summary.succeeded += 1;
                continue;
            };

            let (persisted, classification) = match classify_source(repository, &slug, &urls).await {
                Ok(classified) => classified,
                Err(error) => {
                    summary.failed += 1;
                    yield Ok(RunEvent::SourceFailed { slug, error });
                    continue;
                },
            };
            summary.count(&classification);
            yield Ok(RunEvent::Classified {
                slug: slug.clone(),
                classification: Box::new(classification.clone()),
                estimate: estimate(&classification),
            });
            if ctx.stage == Stage::Detect {
                summary.succeeded += 1;
                continue;
            }

            let plan = match &ctx.extractor {
                None => WriteBack::new(&classification, ctx.date),
                Some(extractor) => {
                    let mut extracted = Vec::with_capacity(classification.new.len());
                    for item in &classification.new {
                        // Items not reached stay untracked, and are new again next run.
                        if ctx.cancel.is_cancelled() {
                            summary.cancelled = true;
                            break;
                        }
                        let outcome = match extract_item(&ctx.fetcher, extractor.as_ref(), &slug, item, ctx.date).await {
                            Ok(Some((entity, cost_usd))) => {
                                summary.extracted += 1;
                                summary.cost_usd += cost_usd;
                                let fingerprint = entity.fingerprint.clone();
                                extracted.push(entity);
                                ItemOutcome::Tracked { fingerprint, cost_usd }
                            },
                            Ok(None) => ItemOutcome::NotASource,
                            Err(error) => {
                                tracing::warn!(source = %slug, url = %item.url, ?error, "Extraction failed; item stays untracked");
                                ItemOutcome::Failed(error)
                            },
                        };
                        yield Ok(RunEvent::Extracted { slug: slug.clone(), url: item.url.clone(), outcome });
                    }
                    plan_with_extractions(&classification, &persisted, extracted, ctx.date)
                },
            };

            match apply_source(repository, source, &slug, &plan).await {
                Ok(applied) => {
                    summary.succeeded += 1;
                    yield Ok(RunEvent::Applied { slug, applied });
                },
                Err(error) => {
                    summary.failed += 1;
                    yield Ok(RunEvent::SourceFailed { slug, error });
                },
            }
        }

        let discovery = DiscoverySummary::new(ctx.date, listings);
        summary.summary = match write_summary(&ctx.output, &discovery).await {
            Ok(path) => path,
            Err(error) => {
                yield Err(error);
                return;
            },
        };
        summary.duration = started.elapsed();
        if let (Stage::Run, Some(repository)) = (ctx.stage, repository) {
            if let Err(error) = repository.record_run(&summary.record()).await.or_raise(|| ErrorKind::Store) {
                yield Err(error);
                return;
            }
        }
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            discovered = summary.discovered,
            new = summary.new,
            moved = summary.moved,
            disappeared = summary.disappeared,
            cancelled = summary.cancelled,
            "Run complete"
        );
        yield Ok(RunEvent::Complete(Box::new(summary)));
    })
}

/// Wait out the delay between sources. Returns `true` if the run was
/// cancelled meanwhile.
async fn pause(ctx: &Context) -> bool {
    if ctx.delay_between_sources.is_zero() {
        return ctx.cancel.is_cancelled();
    }
    tokio::select! {
        () = ctx.cancel.cancelled() => true,
        () = tokio::time::sleep(ctx.delay_between_sources) => false,
    }
}

#[instrument(skip_all, fields(source = %slug))]
async fn discover_source(ctx: &Context, source: &SourceConfig, slug: &str) -> Result<(DiscoveryReport, PathBuf)> {
    let options = discover_options(source)?;
    let report = Frontier::new(ctx.fetcher.clone(), options).discover(&ctx.cancel).await;
    if report.fetched == 0 && report.failed > 0 && !report.cancelled {
        exn::bail!(ErrorKind::NothingFetched(slug.to_string()));
    }
    let listing = write_listing(&ctx.output, ctx.date, slug, &report.urls()).await?;
    Ok((report, listing))
}

#[instrument(skip_all, fields(source = %slug))]
async fn classify_source(
    repository: &Repository,
    slug: &str,
    urls: &[String],
) -> Result<(Vec<TrackedEntity>, Classification)> {
    let persisted = repository.list_entities(slug).await.or_raise(|| ErrorKind::Store)?;
    let discovered = with_hints(urls, &persisted);
    let classification = ChangeDetector::new(slug).detect(&discovered, &persisted);
    Ok((persisted, classification))
}

/// Write back, then refresh the source row so its item total reflects it.
#[instrument(skip_all, fields(source = %slug))]
async fn apply_source(
    repository: &Repository,
    source: &SourceConfig,
    slug: &str,
    plan: &WriteBack,
) -> Result<Applied> {
    let applied = repository.apply(plan).await.or_raise(|| ErrorKind::Store)?;
    repository
        .record_source(slug, &source.name, &source.root_url, plan.date)
        .await
        .or_raise(|| ErrorKind::Store)?;
    Ok(applied)
}
