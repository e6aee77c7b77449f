//! Repository for tracked entities, sources and runs.
//!
//! Entities are only ever written through [`Repository::apply`] during a run
//! (or [`Repository::upsert_entity`] when recording extracted content), so
//! the store always reflects a complete classification of each source.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{EntityRow, RunRecord, RunRow, SourceRecord, SourceRow, date_to_timestamp};
use exn::{OptionExt, ResultExt};
use spoor_track::{Fingerprint, TrackedEntity, WriteBack};
use sqlx::{SqliteConnection, SqlitePool};
use time::Date;
use tracing::instrument;

/// What [`Repository::apply`] changed.
///
/// In dry-run mode these are the counts that *would* have been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub inserted: usize,
    pub moved: usize,
    pub observed: usize,
    pub retired: usize,
}

impl Applied {
    fn planned(write_back: &WriteBack) -> Self {
        Self {
            inserted: write_back.inserts.len(),
            moved: write_back.moves.len(),
            observed: write_back.observed.len(),
            retired: write_back.retired.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    ///
    /// A dry-run repository reads normally but never writes.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn write_entity(conn: &mut SqliteConnection, entity: &TrackedEntity) -> Result<()> {
        let row = EntityRow::try_from(entity)?;
        sqlx::query(include_str!("../queries/upsert_entity.sql"))
            .bind(row.fingerprint)
            .bind(row.source)
            .bind(row.group_name)
            .bind(row.item)
            .bind(row.variant)
            .bind(row.version)
            .bind(row.current_url)
            .bind(row.url_history)
            .bind(row.first_seen)
            .bind(row.last_seen)
            .bind(row.last_url_change)
            .bind(row.status)
            .bind(row.content_ref)
            .execute(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn read_entity(conn: &mut SqliteConnection, fingerprint: &str) -> Result<Option<TrackedEntity>> {
        let row: Option<EntityRow> = sqlx::query_as(include_str!("../queries/get_entity.sql"))
            .bind(fingerprint)
            .fetch_optional(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(TrackedEntity::try_from).transpose()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Insert or replace a single entity. An existing row keeps the earlier
    /// of the two `first_seen` dates.
    pub async fn upsert_entity(&self, entity: &TrackedEntity) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::write_entity(&mut *conn, entity).await
    }

    pub async fn get_entity(&self, fingerprint: &Fingerprint) -> Result<Option<TrackedEntity>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::read_entity(&mut *conn, fingerprint.as_str()).await
    }

    /// Every entity of a source, active and disappeared, oldest first.
    ///
    /// This is the snapshot a discovery pass is classified against.
    pub async fn list_entities(&self, source: &str) -> Result<Vec<TrackedEntity>> {
        let rows: Vec<EntityRow> = sqlx::query_as(include_str!("../queries/list_entities_for_source.sql"))
            .bind(source)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TrackedEntity::try_from).collect()
    }

    /// Apply a write-back plan for one source in a single transaction.
    ///
    /// Fails with [`ErrorKind::EntityNotFound`] if a move, observation or
    /// retirement references a fingerprint this source doesn't have. Nothing
    /// is written in that case.
    #[instrument(skip_all, fields(source = %write_back.source, date = %write_back.date))]
    pub async fn apply(&self, write_back: &WriteBack) -> Result<Applied> {
        if self.dry_run {
            tracing::info!("Dry run; write-back skipped");
            return Ok(Applied::planned(write_back));
        }
        let source = write_back.source.as_str();
        let last_seen = date_to_timestamp(write_back.date);
        let mut applied = Applied::default();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;

        for entity in &write_back.inserts {
            Self::write_entity(&mut *tx, entity).await?;
            applied.inserted += 1;
        }

        for moved in &write_back.moves {
            let fingerprint = moved.fingerprint.as_str();
            let mut entity = Self::read_entity(&mut *tx, fingerprint)
                .await?
                .filter(|entity| entity.source == source)
                .ok_or_raise(|| ErrorKind::EntityNotFound(fingerprint.to_string()))?;
            entity.relocate(&moved.new_url, write_back.date);
            let row = EntityRow::try_from(&entity)?;
            sqlx::query(include_str!("../queries/relocate_entity.sql"))
                .bind(row.current_url)
                .bind(row.url_history)
                .bind(row.last_seen)
                .bind(row.last_url_change)
                .bind(row.status)
                .bind(fingerprint)
                .bind(source)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            applied.moved += 1;
        }

        for fingerprint in &write_back.observed {
            let result = sqlx::query(include_str!("../queries/observe_entity.sql"))
                .bind(last_seen)
                .bind(fingerprint.as_str())
                .bind(source)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            if result.rows_affected() == 0 {
                exn::bail!(ErrorKind::EntityNotFound(fingerprint.to_string()));
            }
            applied.observed += 1;
        }

        for fingerprint in &write_back.retired {
            let result = sqlx::query(include_str!("../queries/retire_entity.sql"))
                .bind(fingerprint.as_str())
                .bind(source)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            // Already disappeared is fine; only active rows are updated.
            applied.retired += result.rows_affected() as usize;
        }

        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(
            inserted = applied.inserted,
            moved = applied.moved,
            observed = applied.observed,
            retired = applied.retired,
            "Write-back applied"
        );
        Ok(applied)
    }

    // =========================================================================
    // Sources
    // =========================================================================

    /// Record a crawl of a source. `total_items` is recounted from the
    /// active entities, so call this after [`Repository::apply`].
    pub async fn record_source(&self, slug: &str, name: &str, root_url: &str, crawled: Date) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let crawled = date_to_timestamp(crawled);
        sqlx::query(include_str!("../queries/upsert_source.sql"))
            .bind(slug)
            .bind(name)
            .bind(root_url)
            .bind(crawled)
            .bind(crawled)
            .bind(slug)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceRecord>> {
        let rows: Vec<SourceRow> = sqlx::query_as(include_str!("../queries/list_sources.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(SourceRecord::try_from).collect()
    }

    // =========================================================================
    // Runs
    // =========================================================================

    /// Record a run summary. A second run on the same date replaces the first.
    pub async fn record_run(&self, run: &RunRecord) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let row = RunRow::try_from(run)?;
        sqlx::query(include_str!("../queries/upsert_run.sql"))
            .bind(row.date)
            .bind(row.sources)
            .bind(row.total_discovered)
            .bind(row.total_new)
            .bind(row.total_moved)
            .bind(row.total_disappeared)
            .bind(row.total_extracted)
            .bind(row.cost_usd)
            .bind(row.duration_minutes)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Run history, most recent first.
    pub async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let rows: Vec<RunRow> = sqlx::query_as(include_str!("../queries/list_runs.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(RunRecord::try_from).collect()
    }
}
