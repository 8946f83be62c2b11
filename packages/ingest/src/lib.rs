#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog refresh pipeline.
//!
//! Pages every category of the catalog source with bounded concurrency,
//! deduplicates what comes back in memory, bulk-loads the result into a
//! staging table, and promotes that table over the live one.

pub mod config;
pub mod dedup;
pub mod pipeline;
pub mod scheduler;

use catalog_refresh_database::DbError;

pub use config::{AppConfig, ConfigError};
pub use pipeline::RefreshPipeline;

/// Errors that abort a refresh before it produces a report.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// No connection to the store could be opened.
    #[error("Failed to connect to the store: {0}")]
    Connect(DbError),

    /// The staging table could not be created.
    #[error("Failed to create staging table {table}: {source}")]
    StagingCreate {
        /// Name of the table that was being created.
        table: String,
        /// Underlying database error.
        source: DbError,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
