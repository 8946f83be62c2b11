//! Staging table lifecycle: create, bulk-append, promote.
//!
//! None of these operations retry, and a failed run leaves its staging table
//! behind.

use catalog_refresh_catalog_models::CatalogRecord;
use catalog_refresh_database_models::SwapStrategy;

use crate::schema::{
    create_table_like_sql, create_table_sql, drop_table_sql, insert_sql, rename_tables_sql,
    retired_table_name, row_values, validate_identifier,
};
use crate::{DbError, SqlExecutor};

/// Rows per `INSERT` statement.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Outcome of a [`bulk_insert`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    /// Number of `INSERT` statements issued.
    pub statements: u64,
    /// Number of rows written.
    pub rows: u64,
}

/// Creates an empty staging table with the catalog layout.
///
/// # Errors
///
/// Returns [`DbError`] if the name is invalid or the DDL fails.
pub async fn create_staging_table(db: &dyn SqlExecutor, table: &str) -> Result<(), DbError> {
    validate_identifier(table)?;
    db.execute(&create_table_sql(table), &[]).await?;
    log::info!("Created staging table {table}");
    Ok(())
}

/// Writes `records` into `table` in batches of at most `batch_size` rows.
///
/// Issues `ceil(len / batch_size)` statements; an empty slice issues none.
///
/// # Errors
///
/// Returns [`DbError`] on the first failing statement. Rows from earlier
/// batches stay in the table.
pub async fn bulk_insert(
    db: &dyn SqlExecutor,
    table: &str,
    records: &[CatalogRecord],
    batch_size: usize,
) -> Result<InsertStats, DbError> {
    validate_identifier(table)?;
    let batch_size = batch_size.max(1);
    let mut stats = InsertStats::default();

    for chunk in records.chunks(batch_size) {
        let params: Vec<_> = chunk.iter().flat_map(row_values).collect();
        db.execute(&insert_sql(table, chunk.len()), &params).await?;
        stats.statements += 1;
        stats.rows += chunk.len() as u64;
    }

    log::debug!(
        "{table}: inserted {} rows in {} statements",
        stats.rows,
        stats.statements
    );

    Ok(stats)
}

/// Makes `staging` the new `live` table.
///
/// See [`SwapStrategy`] for what each strategy guarantees about the live
/// table while the swap is in progress.
///
/// # Errors
///
/// Returns [`DbError`] if a name is invalid or a swap statement fails.
pub async fn promote(
    db: &dyn SqlExecutor,
    staging: &str,
    live: &str,
    strategy: SwapStrategy,
) -> Result<(), DbError> {
    validate_identifier(staging)?;
    validate_identifier(live)?;

    match strategy {
        SwapStrategy::DropThenRename => {
            db.execute(&drop_table_sql(live), &[]).await?;
            db.execute(&rename_tables_sql(&[(staging, live)]), &[])
                .await?;
        }
        SwapStrategy::Atomic => {
            let retired = retired_table_name(staging);
            validate_identifier(&retired)?;

            // First run against an empty schema: give the swap something
            // to park.
            db.execute(&create_table_like_sql(live, staging), &[])
                .await?;
            db.execute(
                &rename_tables_sql(&[(live, &retired), (staging, live)]),
                &[],
            )
            .await?;

            if let Err(e) = db.execute(&drop_table_sql(&retired), &[]).await {
                log::warn!("Promoted {staging} to {live} but failed to drop {retired}: {e}");
            }
        }
    }

    log::info!("Promoted {staging} to {live} ({strategy})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use catalog_refresh_catalog_models::{BookRecord, MagazineRecord};

    use super::*;
    use crate::memory::{CellValue, MemoryDatabase};

    fn books(n: usize) -> Vec<CatalogRecord> {
        (0..n)
            .map(|i| {
                CatalogRecord::Book(BookRecord {
                    name: format!("book {i}"),
                    id: i.to_string(),
                    ..BookRecord::default()
                })
            })
            .collect()
    }

    async fn staged(db: &MemoryDatabase, table: &str, rows: usize) {
        let conn = db.connection();
        create_staging_table(&conn, table).await.unwrap();
        bulk_insert(&conn, table, &books(rows), DEFAULT_BATCH_SIZE)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn batches_of_ten_with_remainder_last() {
        for (m, expected) in [(0usize, 0usize), (1, 1), (10, 1), (11, 2), (25, 3), (30, 3)] {
            let db = MemoryDatabase::new();
            let conn = db.connection();
            create_staging_table(&conn, "s").await.unwrap();

            let stats = bulk_insert(&conn, "s", &books(m), DEFAULT_BATCH_SIZE)
                .await
                .unwrap();

            assert_eq!(stats.statements, expected as u64, "m = {m}");
            assert_eq!(stats.rows, m as u64);

            let sizes = db.insert_batch_sizes();
            assert_eq!(sizes.len(), expected);
            assert!(sizes.iter().all(|s| *s <= 10));
            if let Some(last) = sizes.last() {
                let want = if m % 10 == 0 { 10 } else { m % 10 };
                assert_eq!(*last, want, "m = {m}");
            }
            assert_eq!(db.row_count("s"), Some(m));
        }
    }

    #[tokio::test]
    async fn maps_both_kinds_into_shared_layout() {
        let db = MemoryDatabase::new();
        let conn = db.connection();
        create_staging_table(&conn, "s").await.unwrap();
        let records = vec![
            CatalogRecord::Book(BookRecord {
                name: "Dune".to_string(),
                publisher: Some("Chilton".to_string()),
                ..BookRecord::default()
            }),
            CatalogRecord::Magazine(MagazineRecord {
                name: "Nature".to_string(),
                issn: Some("0028-0836".to_string()),
                ..MagazineRecord::default()
            }),
        ];
        bulk_insert(&conn, "s", &records, DEFAULT_BATCH_SIZE)
            .await
            .unwrap();

        let rows = db.rows("s").unwrap();
        assert_eq!(rows[0].get("is_book"), Some(&CellValue::Int(1)));
        assert_eq!(
            rows[0].get("publish"),
            Some(&CellValue::Text("Chilton".to_string()))
        );
        assert_eq!(rows[0].get("issn"), Some(&CellValue::Null));
        assert_eq!(rows[1].get("is_book"), Some(&CellValue::Int(0)));
        assert_eq!(rows[1].get("publish"), Some(&CellValue::Null));
        assert_eq!(
            rows[1].get("issn"),
            Some(&CellValue::Text("0028-0836".to_string()))
        );
    }

    #[tokio::test]
    async fn drop_then_rename_replaces_live_table() {
        let db = MemoryDatabase::new();
        staged(&db, "book", 5).await;
        staged(&db, "s", 2).await;

        promote(&db.connection(), "s", "book", SwapStrategy::DropThenRename)
            .await
            .unwrap();

        assert_eq!(db.row_count("book"), Some(2));
        assert!(!db.has_table("s"));
    }

    #[tokio::test]
    async fn drop_then_rename_failure_between_statements_leaves_live_absent() {
        let db = MemoryDatabase::new();
        staged(&db, "book", 5).await;
        staged(&db, "s", 2).await;
        db.fail_statements_starting_with("RENAME TABLE");

        let result = promote(&db.connection(), "s", "book", SwapStrategy::DropThenRename).await;

        assert!(result.is_err());
        assert!(!db.has_table("book"));
        assert_eq!(db.row_count("s"), Some(2));
    }

    #[tokio::test]
    async fn atomic_swap_replaces_live_and_drops_retired() {
        let db = MemoryDatabase::new();
        staged(&db, "book", 5).await;
        staged(&db, "s", 2).await;

        promote(&db.connection(), "s", "book", SwapStrategy::Atomic)
            .await
            .unwrap();

        assert_eq!(db.row_count("book"), Some(2));
        assert!(!db.has_table("s"));
        assert!(!db.has_table("s_old"));
    }

    #[tokio::test]
    async fn atomic_swap_creates_live_on_first_run() {
        let db = MemoryDatabase::new();
        staged(&db, "s", 3).await;

        promote(&db.connection(), "s", "book", SwapStrategy::Atomic)
            .await
            .unwrap();

        assert_eq!(db.tables(), vec!["book".to_string()]);
        assert_eq!(db.row_count("book"), Some(3));
    }

    #[tokio::test]
    async fn atomic_swap_failure_never_leaves_live_absent() {
        for failing in ["CREATE TABLE", "RENAME TABLE"] {
            let db = MemoryDatabase::new();
            staged(&db, "book", 5).await;
            staged(&db, "s", 2).await;
            db.fail_statements_starting_with(failing);

            let result = promote(&db.connection(), "s", "book", SwapStrategy::Atomic).await;

            assert!(result.is_err(), "{failing}");
            assert_eq!(db.row_count("book"), Some(5), "{failing}");
        }
    }

    #[tokio::test]
    async fn atomic_swap_tolerates_failed_cleanup() {
        let db = MemoryDatabase::new();
        staged(&db, "book", 5).await;
        staged(&db, "s", 2).await;
        db.fail_statements_starting_with("DROP TABLE");

        promote(&db.connection(), "s", "book", SwapStrategy::Atomic)
            .await
            .unwrap();

        assert_eq!(db.row_count("book"), Some(2));
        assert_eq!(db.row_count("s_old"), Some(5));
    }

    #[tokio::test]
    async fn rejects_invalid_live_name() {
        let db = MemoryDatabase::new();
        staged(&db, "s", 1).await;
        let err = promote(&db.connection(), "s", "book; --", SwapStrategy::Atomic)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier { .. }));
        assert!(db.has_table("s"));
    }
}
