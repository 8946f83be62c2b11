#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Refresh configuration, pipeline state, and run report types.

use std::time::Duration;

use catalog_refresh_catalog_models::EntityKind;
use catalog_refresh_database_models::SwapStrategy;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Book category ids are `0..DEFAULT_BOOK_CATEGORIES`.
pub const DEFAULT_BOOK_CATEGORIES: u32 = 3000;

/// Magazine category ids are `0..DEFAULT_MAGAZINE_CATEGORIES`.
pub const DEFAULT_MAGAZINE_CATEGORIES: u32 = 1000;

/// Fetch tasks allowed to run at the same time.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// How concurrently arriving pages are deduplicated.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DedupMode {
    /// Filter a page against the set as it stood, then append the survivors
    /// in a second step. Two tasks that filter the same entry before either
    /// appends will both append it, and duplicates within one page are not
    /// caught.
    #[default]
    CheckThenAppend,
    /// Filter and append under one lock, checking each record against
    /// everything accepted before it. Never produces duplicates.
    Atomic,
}

/// Settings for one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    /// Table the refreshed data ends up in.
    pub live_table: String,
    /// Prefix for the per-run staging table name.
    pub staging_prefix: String,
    /// Number of book categories to page through.
    pub book_categories: u32,
    /// Number of magazine categories to page through.
    pub magazine_categories: u32,
    /// Maximum fetch tasks in flight.
    pub concurrency: usize,
    /// Rows per `INSERT` statement.
    pub batch_size: usize,
    /// Stop paging a category after this many pages.
    pub max_pages_per_category: Option<u32>,
    /// How the staging table replaces the live table.
    pub swap: SwapStrategy,
    /// How concurrently arriving pages are deduplicated.
    pub dedup: DedupMode,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            live_table: "book".to_string(),
            staging_prefix: "book_".to_string(),
            book_categories: DEFAULT_BOOK_CATEGORIES,
            magazine_categories: DEFAULT_MAGAZINE_CATEGORIES,
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: 10,
            max_pages_per_category: None,
            swap: SwapStrategy::default(),
            dedup: DedupMode::default(),
        }
    }
}

impl RefreshConfig {
    /// Number of categories configured for `kind`.
    #[must_use]
    pub const fn categories(&self, kind: EntityKind) -> u32 {
        match kind {
            EntityKind::Book => self.book_categories,
            EntityKind::Magazine => self.magazine_categories,
        }
    }
}

/// Where a refresh run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Nothing has happened yet
    Idle,
    /// The staging table exists
    StagingCreated,
    /// Fetch tasks are running
    Fetching,
    /// Writing into the staging table and swapping
    Loading,
    /// The staging table is now the live table
    Promoted,
    /// Loading or promotion failed
    Failed,
}

/// Why a pagination loop for one `(kind, category)` stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Termination {
    /// The source reported no more pages.
    Exhausted,
    /// A page fetch failed.
    Failed {
        /// The error message.
        message: String,
    },
    /// The configured page cap was reached.
    PageLimit,
}

/// What one pagination loop did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    /// Kind that was paged.
    pub kind: EntityKind,
    /// Fetch calls issued, including the one that ended the loop.
    pub fetch_calls: u32,
    /// Records received across all successful pages.
    pub records_received: u64,
    /// Records that passed deduplication.
    pub records_recorded: u64,
    /// Why the loop stopped.
    pub termination: Termination,
}

/// What one fetch task did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Category the task paged through.
    pub category_id: u32,
    /// One entry per kind paged, in paging order.
    pub kinds: Vec<KindReport>,
}

/// Totals across all fetch tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    /// Fetch tasks run.
    pub tasks: u64,
    /// Fetch calls issued.
    pub fetch_calls: u64,
    /// Records received from the source.
    pub records_received: u64,
    /// Records accepted by deduplication.
    pub records_recorded: u64,
    /// Loops that ended with [`Termination::Exhausted`].
    pub exhausted: u64,
    /// Loops that ended with [`Termination::Failed`].
    pub failed: u64,
    /// Loops that ended with [`Termination::PageLimit`].
    pub page_limited: u64,
}

impl FetchSummary {
    /// Folds one task report into the totals.
    pub fn add(&mut self, report: &TaskReport) {
        self.tasks += 1;
        for kind in &report.kinds {
            self.fetch_calls += u64::from(kind.fetch_calls);
            self.records_received += kind.records_received;
            self.records_recorded += kind.records_recorded;
            match kind.termination {
                Termination::Exhausted => self.exhausted += 1,
                Termination::Failed { .. } => self.failed += 1,
                Termination::PageLimit => self.page_limited += 1,
            }
        }
    }
}

/// Result of a refresh run that got past staging table creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Staging table used by this run.
    pub staging_table: String,
    /// Target live table.
    pub live_table: String,
    /// Terminal state.
    pub state: PipelineState,
    /// Fetch phase totals.
    pub fetch: FetchSummary,
    /// Book rows written to the staging table.
    pub books_loaded: u64,
    /// Magazine rows written to the staging table.
    pub magazines_loaded: u64,
    /// `INSERT` statements issued.
    pub insert_statements: u64,
    /// Error message if the run ended in [`PipelineState::Failed`].
    pub failure: Option<String>,
    /// Wall-clock time of the run.
    pub duration: Duration,
}
