//! HTTP catalog source.
//!
//! Requests `GET {base_url}/{kind_path}?{category_param}={id}&{page_param}={page}`
//! and decodes the body as either a bare JSON array of records or an object
//! holding that array at a dot-separated `records_path`.
//!
//! A 404 or an empty array is reported as [`PageOutcome::Exhausted`]. No
//! request is ever retried.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use catalog_refresh_catalog_models::{BookRecord, CatalogRecord, EntityKind, MagazineRecord};
use serde::{Deserialize, Serialize};

use crate::{CatalogSource, PageOutcome, SourceError};

/// Connection settings for [`HttpCatalogSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Path segment for book listings.
    pub book_path: String,
    /// Path segment for magazine listings.
    pub magazine_path: String,
    /// Query parameter carrying the category id.
    pub category_param: String,
    /// Query parameter carrying the zero-based page number.
    pub page_param: String,
    /// Dot-separated path to the record array. `None` means the body is a
    /// bare array.
    pub records_path: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            book_path: "books".to_string(),
            magazine_path: "magazines".to_string(),
            category_param: "category".to_string(),
            page_param: "page".to_string(),
            records_path: None,
            timeout_secs: 30,
        }
    }
}

impl HttpSourceConfig {
    /// Builds the request URL for one page.
    #[must_use]
    pub fn page_url(&self, kind: EntityKind, category_id: u32, page: u32) -> String {
        let path = match kind {
            EntityKind::Book => &self.book_path,
            EntityKind::Magazine => &self.magazine_path,
        };
        let mut url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let separator = if url.contains('?') { '&' } else { '?' };
        write!(
            url,
            "{separator}{}={category_id}&{}={page}",
            self.category_param, self.page_param
        )
        .unwrap_or_default();
        url
    }
}

/// [`CatalogSource`] backed by a JSON-over-HTTP listing API.
#[derive(Debug)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpCatalogSource {
    /// Creates a source with its own [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be built.
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

/// Maps a response status to the page outcome it decides on its own.
///
/// `None` means the body has to be decoded: the status was a success.
#[must_use]
pub fn classify_status(
    status: reqwest::StatusCode,
    url: &str,
) -> Option<Result<PageOutcome, SourceError>> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Some(Ok(PageOutcome::Exhausted));
    }
    if !status.is_success() {
        return Some(Err(SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }));
    }
    None
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn label(&self) -> &str {
        &self.config.base_url
    }

    async fn fetch_page(
        &self,
        kind: EntityKind,
        category_id: u32,
        page: u32,
    ) -> Result<PageOutcome, SourceError> {
        let url = self.config.page_url(kind, category_id, page);
        log::trace!("Fetching {kind} category {category_id} page {page}: {url}");

        let response = self.client.get(&url).send().await?;
        if let Some(outcome) = classify_status(response.status(), &url) {
            return outcome;
        }

        let text = response.text().await?;
        let body: serde_json::Value = serde_json::from_str(&text)?;

        decode_page(kind, &body, self.config.records_path.as_deref())
    }
}

/// Navigates a dot-separated path into a [`serde_json::Value`].
fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Decodes one response body into a [`PageOutcome`].
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if the record array is missing, and
/// [`SourceError::Json`] if a record does not match the kind's shape.
pub fn decode_page(
    kind: EntityKind,
    body: &serde_json::Value,
    records_path: Option<&str>,
) -> Result<PageOutcome, SourceError> {
    let array = match records_path {
        Some(path) => resolve_path(body, path).ok_or_else(|| SourceError::Malformed {
            message: format!("response does not contain path '{path}'"),
        })?,
        None => body,
    };

    let items = array.as_array().ok_or_else(|| SourceError::Malformed {
        message: "expected JSON array of records".to_string(),
    })?;

    if items.is_empty() {
        return Ok(PageOutcome::Exhausted);
    }

    let records = items
        .iter()
        .map(|item| decode_record(kind, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageOutcome::Page(records))
}

fn decode_record(kind: EntityKind, item: &serde_json::Value) -> Result<CatalogRecord, SourceError> {
    Ok(match kind {
        EntityKind::Book => CatalogRecord::Book(BookRecord::deserialize(item)?),
        EntityKind::Magazine => CatalogRecord::Magazine(MagazineRecord::deserialize(item)?),
    })
}
