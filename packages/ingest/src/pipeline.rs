//! Refresh pipeline orchestration.
//!
//! A run walks `Idle -> StagingCreated -> Fetching -> Loading` and ends in
//! `Promoted` or `Failed`:
//!
//! 1. Create a freshly named staging table. Failure here aborts the run
//!    before anything is fetched.
//! 2. Run every fetch task and wait for all of them.
//! 3. Bulk-insert books, then magazines, into the staging table.
//! 4. Promote the staging table over the live table.
//!
//! Fetch tasks never touch the store. Step 1 uses a short-lived connection
//! that is released before fetching starts, and steps 3 and 4 share a single
//! connection opened after every fetch task has finished. A failed run leaves
//! its staging table in place.

use std::sync::Arc;
use std::time::Instant;

use catalog_refresh_catalog_models::{AccumulatedSet, EntityKind};
use catalog_refresh_database::schema::new_staging_table_name;
use catalog_refresh_database::staging::{InsertStats, bulk_insert, create_staging_table, promote};
use catalog_refresh_database::{Connector, DbError, SqlExecutor};
use catalog_refresh_ingest_models::{PipelineState, RefreshConfig, RunReport};
use catalog_refresh_source::CatalogSource;
use catalog_refresh_source::progress::{ProgressCallback, null_progress};

use crate::RefreshError;
use crate::dedup::Deduplicator;
use crate::scheduler::fetch_all;

#[derive(Debug, Default)]
struct LoadStats {
    books: u64,
    magazines: u64,
    statements: u64,
}

impl LoadStats {
    fn add(&mut self, kind: EntityKind, stats: InsertStats) {
        match kind {
            EntityKind::Book => self.books += stats.rows,
            EntityKind::Magazine => self.magazines += stats.rows,
        }
        self.statements += stats.statements;
    }
}

/// Drives one full refresh from the source into the live table.
pub struct RefreshPipeline {
    config: RefreshConfig,
    source: Arc<dyn CatalogSource>,
    progress: Arc<dyn ProgressCallback>,
}

impl RefreshPipeline {
    /// Creates a pipeline for `config` that pages `source`, with no progress
    /// reporting.
    #[must_use]
    pub fn new(config: RefreshConfig, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            config,
            source,
            progress: null_progress(),
        }
    }

    /// Reports finished fetch tasks to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    fn transition(&self, state: &mut PipelineState, next: PipelineState) {
        log::info!("{}: {state} -> {next}", self.source.label());
        *state = next;
    }

    /// Runs the refresh against connections opened from `store`.
    ///
    /// Load and promotion failures do not return `Err`; they end the run in
    /// [`PipelineState::Failed`] with the message in [`RunReport::failure`].
    /// That includes failing to reconnect for the load phase.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Connect`] or [`RefreshError::StagingCreate`] if
    /// the staging table cannot be set up. Nothing is fetched in that case.
    pub async fn run(&self, store: &dyn Connector) -> Result<RunReport, RefreshError> {
        let start = Instant::now();
        let label = self.source.label();
        let config = &self.config;
        let mut state = PipelineState::Idle;

        let staging_table = new_staging_table_name(&config.staging_prefix);
        log::info!(
            "{label}: refreshing {} via staging table {staging_table}",
            config.live_table
        );

        self.create_staging(store, &staging_table).await?;
        self.transition(&mut state, PipelineState::StagingCreated);

        let dedup = Deduplicator::new(config.dedup);
        self.transition(&mut state, PipelineState::Fetching);
        let fetch = fetch_all(self.source.as_ref(), &dedup, config, &self.progress).await;
        log::debug!(
            "{label}: fetch done with {} books and {} magazines kept",
            dedup.len(EntityKind::Book),
            dedup.len(EntityKind::Magazine),
        );
        let accumulated = dedup.into_accumulated();
        if accumulated.is_empty() {
            log::warn!(
                "{label}: nothing accumulated, {} will be replaced by an empty table",
                config.live_table
            );
        }

        self.transition(&mut state, PipelineState::Loading);
        let mut stats = LoadStats::default();
        let failure = match self
            .load_and_promote(store, &staging_table, &accumulated, &mut stats)
            .await
        {
            Ok(()) => {
                self.transition(&mut state, PipelineState::Promoted);
                None
            }
            Err(e) => {
                log::error!("{label}: refresh failed, staging table {staging_table} left in place: {e}");
                self.transition(&mut state, PipelineState::Failed);
                Some(e.to_string())
            }
        };

        let duration = start.elapsed();
        log::info!(
            "{label}: {state} in {:.1}s ({} books, {} magazines, {} insert statements)",
            duration.as_secs_f64(),
            stats.books,
            stats.magazines,
            stats.statements,
        );

        Ok(RunReport {
            staging_table,
            live_table: config.live_table.clone(),
            state,
            fetch: fetch.summary,
            books_loaded: stats.books,
            magazines_loaded: stats.magazines,
            insert_statements: stats.statements,
            failure,
            duration,
        })
    }

    async fn create_staging(&self, store: &dyn Connector, staging_table: &str) -> Result<(), RefreshError> {
        let label = self.source.label();
        let db = store.connect().await.map_err(|e| {
            log::error!("{label}: failed to connect to the store: {e}");
            RefreshError::Connect(e)
        })?;

        if let Err(source) = create_staging_table(db.as_ref(), staging_table).await {
            log::error!("{label}: failed to create staging table {staging_table}: {source}");
            return Err(RefreshError::StagingCreate {
                table: staging_table.to_string(),
                source,
            });
        }

        drop(db);
        log::debug!("{label}: released setup connection");
        Ok(())
    }

    /// Opens the load connection, inserts everything, and promotes. The
    /// connection is released on every path out of here.
    async fn load_and_promote(
        &self,
        store: &dyn Connector,
        staging_table: &str,
        accumulated: &AccumulatedSet,
        stats: &mut LoadStats,
    ) -> Result<(), DbError> {
        let db: Box<dyn SqlExecutor> = store.connect().await?;

        for kind in EntityKind::all() {
            let records = accumulated.records(*kind);
            let inserted = bulk_insert(db.as_ref(), staging_table, &records, self.config.batch_size).await?;
            stats.add(*kind, inserted);
        }

        promote(db.as_ref(), staging_table, &self.config.live_table, self.config.swap).await
    }
}
