//! Bounded-concurrency fetch scheduler.
//!
//! One task per category id. A task pages through every kind whose category
//! range contains its id, books first, and stops each kind at the first
//! exhausted or failed page. At most `concurrency` tasks are in flight, and
//! [`fetch_all`] returns only after every task has finished.

use std::sync::Arc;

use catalog_refresh_catalog_models::EntityKind;
use catalog_refresh_ingest_models::{FetchSummary, KindReport, RefreshConfig, TaskReport, Termination};
use catalog_refresh_source::{CatalogSource, PageOutcome, progress::ProgressCallback};
use futures::StreamExt as _;

use crate::dedup::Deduplicator;

/// Reports from every task plus their totals.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// One report per task, in completion order.
    pub reports: Vec<TaskReport>,
    /// Totals across `reports`.
    pub summary: FetchSummary,
}

/// Number of fetch tasks a run seeds: one per id in the larger of the two
/// category ranges.
#[must_use]
pub fn task_count(config: &RefreshConfig) -> u32 {
    config.book_categories.max(config.magazine_categories)
}

/// Kinds a task for `category_id` pages through, in paging order.
#[must_use]
pub fn kinds_for(config: &RefreshConfig, category_id: u32) -> Vec<EntityKind> {
    EntityKind::all()
        .iter()
        .copied()
        .filter(|kind| category_id < config.categories(*kind))
        .collect()
}

/// Pages through one `(kind, category)` until the source stops producing
/// pages, feeding every page into `dedup`.
pub async fn page_category(
    source: &dyn CatalogSource,
    dedup: &Deduplicator,
    kind: EntityKind,
    category_id: u32,
    max_pages: Option<u32>,
) -> KindReport {
    let label = source.label();
    let mut page = 0u32;
    let mut records_received = 0u64;
    let mut records_recorded = 0u64;

    let termination = loop {
        if let Some(max) = max_pages
            && page >= max
        {
            log::debug!("{label}: {kind} category {category_id} stopped at page cap {max}");
            break Termination::PageLimit;
        }

        let result = source.fetch_page(kind, category_id, page).await;
        page += 1;

        match result {
            Ok(PageOutcome::Page(records)) => {
                records_received += records.len() as u64;
                records_recorded += dedup.record(records) as u64;
            }
            Ok(PageOutcome::Exhausted) => {
                log::debug!(
                    "{label}: {kind} category {category_id} exhausted after {} pages",
                    page - 1
                );
                break Termination::Exhausted;
            }
            Err(e) => {
                log::warn!(
                    "{label}: {kind} category {category_id} page {} failed: {e}",
                    page - 1
                );
                break Termination::Failed {
                    message: e.to_string(),
                };
            }
        }
    };

    KindReport {
        kind,
        fetch_calls: page,
        records_received,
        records_recorded,
        termination,
    }
}

/// Runs the fetch task for one category id.
pub async fn run_task(
    source: &dyn CatalogSource,
    dedup: &Deduplicator,
    config: &RefreshConfig,
    category_id: u32,
) -> TaskReport {
    let mut kinds = Vec::new();
    for kind in kinds_for(config, category_id) {
        kinds.push(
            page_category(
                source,
                dedup,
                kind,
                category_id,
                config.max_pages_per_category,
            )
            .await,
        );
    }
    TaskReport { category_id, kinds }
}

/// Runs every fetch task with at most `config.concurrency` in flight and
/// waits for all of them.
pub async fn fetch_all(
    source: &dyn CatalogSource,
    dedup: &Deduplicator,
    config: &RefreshConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> FetchOutcome {
    let label = source.label();
    let tasks = task_count(config);
    let concurrency = config.concurrency.max(1);

    log::info!(
        "{label}: scheduling {tasks} fetch tasks ({} book, {} magazine categories, {concurrency} concurrent)",
        config.book_categories,
        config.magazine_categories,
    );
    progress.set_total(u64::from(tasks));
    progress.set_message(format!("{label}: fetching"));

    let reports: Vec<TaskReport> = futures::stream::iter((0..tasks).map(|category_id| async move {
        let report = run_task(source, dedup, config, category_id).await;
        progress.inc(1);
        report
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let mut summary = FetchSummary::default();
    for report in &reports {
        summary.add(report);
    }

    log::info!(
        "{label}: fetched {} pages, {} records received, {} recorded ({} loops exhausted, {} failed, {} capped)",
        summary.fetch_calls,
        summary.records_received,
        summary.records_recorded,
        summary.exhausted,
        summary.failed,
        summary.page_limited,
    );
    progress.finish(format!(
        "{label}: {} records from {} tasks",
        summary.records_recorded, summary.tasks
    ));

    FetchOutcome { reports, summary }
}
