#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog source adapter trait.
//!
//! The pipeline only ever asks a source for one page of one category of one
//! [`EntityKind`] at a time. Implementations report the end of a category
//! with [`PageOutcome::Exhausted`] and everything else that goes wrong with a
//! [`SourceError`]. The fetch scheduler stops paginating on either.

pub mod http;
pub mod progress;

use async_trait::async_trait;
use catalog_refresh_catalog_models::{CatalogRecord, EntityKind};

/// Errors that can occur while fetching a page from the catalog source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The source answered with a non-success status.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body did not have the expected shape.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Result of a single successful page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Records on this page. May be empty if the source returned an empty
    /// page without declaring the category exhausted.
    Page(Vec<CatalogRecord>),
    /// The category has no more pages.
    Exhausted,
}

/// A paginated catalog that can be read one `(kind, category, page)` at a
/// time.
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every concurrently running fetch task.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable label used in log lines.
    fn label(&self) -> &str;

    /// Fetches one page of a category.
    ///
    /// `page` starts at 0 and is only ever incremented by one between calls
    /// for the same `(kind, category_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response cannot be
    /// decoded.
    async fn fetch_page(
        &self,
        kind: EntityKind,
        category_id: u32,
        page: u32,
    ) -> Result<PageOutcome, SourceError>;
}
