#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog record types shared across the refresh pipeline.
//!
//! A catalog entry is either a [`BookRecord`] or a [`MagazineRecord`]. Both
//! are carried through the pipeline as a [`CatalogRecord`], which knows its
//! [`EntityKind`] and its deduplication [`IdentityKey`].
//!
//! The source-assigned `id` is deliberately *not* part of the identity key:
//! the same id may show up on different pages or in different categories.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The two kinds of catalog entries the source publishes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    /// A book listing
    Book,
    /// A magazine listing
    Magazine,
}

impl EntityKind {
    /// Both kinds, in the order a fetch task pages through them.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Book, Self::Magazine]
    }

    /// Value stored in the `is_book` discriminator column.
    #[must_use]
    pub const fn is_book_flag(self) -> i32 {
        match self {
            Self::Book => 1,
            Self::Magazine => 0,
        }
    }
}

/// A book listing as returned by the catalog source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    /// Title.
    #[serde(default)]
    pub name: String,
    /// Source-assigned catalog number.
    #[serde(default)]
    pub id: String,
    /// Short description.
    #[serde(default)]
    pub summary: String,
    /// Author name.
    pub author: Option<String>,
    /// Publisher name. Stored in the `publish` column.
    pub publisher: Option<String>,
    /// Large cover image URL.
    pub big_cover: Option<String>,
    /// Small cover image URL.
    pub small_cover: Option<String>,
    /// ISBN.
    pub isbn: Option<String>,
    /// Listed price, kept as the source's string form.
    pub price: Option<String>,
    /// Category tag.
    #[serde(rename = "type")]
    pub book_type: Option<String>,
    /// Reader resource identifier.
    pub surl: Option<String>,
}

/// A magazine listing as returned by the catalog source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagazineRecord {
    /// Title.
    #[serde(default)]
    pub name: String,
    /// Source-assigned catalog number.
    #[serde(default)]
    pub id: String,
    /// Short description.
    #[serde(default)]
    pub summary: String,
    /// Cover image URL.
    pub cover: Option<String>,
    /// Domestic serial number.
    pub cn: Option<String>,
    /// International standard serial number.
    pub issn: Option<String>,
    /// Reader resource identifier.
    pub surl: Option<String>,
}

/// The attribute tuple that decides whether two records denote the same
/// catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// `(name, author, publisher)`
    Book {
        /// Title.
        name: String,
        /// Author, if the source provided one.
        author: Option<String>,
        /// Publisher, if the source provided one.
        publisher: Option<String>,
    },
    /// `(name, issn)`
    Magazine {
        /// Title.
        name: String,
        /// ISSN, if the source provided one.
        issn: Option<String>,
    },
}

impl BookRecord {
    /// Returns this book's deduplication key.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::Book {
            name: self.name.clone(),
            author: self.author.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl MagazineRecord {
    /// Returns this magazine's deduplication key.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::Magazine {
            name: self.name.clone(),
            issn: self.issn.clone(),
        }
    }
}

/// A catalog entry of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogRecord {
    /// A book listing
    Book(BookRecord),
    /// A magazine listing
    Magazine(MagazineRecord),
}

impl CatalogRecord {
    /// Returns which kind of entry this is.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Book(_) => EntityKind::Book,
            Self::Magazine(_) => EntityKind::Magazine,
        }
    }

    /// Title of the entry.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Book(b) => &b.name,
            Self::Magazine(m) => &m.name,
        }
    }

    /// Returns the deduplication key for this entry.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        match self {
            Self::Book(b) => b.identity_key(),
            Self::Magazine(m) => m.identity_key(),
        }
    }
}

impl From<BookRecord> for CatalogRecord {
    fn from(value: BookRecord) -> Self {
        Self::Book(value)
    }
}

impl From<MagazineRecord> for CatalogRecord {
    fn from(value: MagazineRecord) -> Self {
        Self::Magazine(value)
    }
}

/// Every unique record collected during one run, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedSet {
    /// Accumulated books.
    pub books: Vec<BookRecord>,
    /// Accumulated magazines.
    pub magazines: Vec<MagazineRecord>,
}

impl AccumulatedSet {
    /// Number of accumulated records of the given kind.
    #[must_use]
    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Book => self.books.len(),
            EntityKind::Magazine => self.magazines.len(),
        }
    }

    /// Whether no records of either kind were accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty() && self.magazines.is_empty()
    }

    /// Appends a record to the sequence for its kind.
    pub fn push(&mut self, record: CatalogRecord) {
        match record {
            CatalogRecord::Book(b) => self.books.push(b),
            CatalogRecord::Magazine(m) => self.magazines.push(m),
        }
    }

    /// Returns the records of one kind as [`CatalogRecord`]s, in arrival
    /// order.
    #[must_use]
    pub fn records(&self, kind: EntityKind) -> Vec<CatalogRecord> {
        match kind {
            EntityKind::Book => self.books.iter().cloned().map(CatalogRecord::Book).collect(),
            EntityKind::Magazine => self
                .magazines
                .iter()
                .cloned()
                .map(CatalogRecord::Magazine)
                .collect(),
        }
    }
}
