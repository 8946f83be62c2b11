//! In-memory deduplication of fetched records.
//!
//! Records are identified by [`IdentityKey`], never by the source-assigned
//! `id`. The accumulated set keeps arrival order, which is also the order
//! rows are inserted in.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use catalog_refresh_catalog_models::{AccumulatedSet, CatalogRecord, EntityKind, IdentityKey};
use catalog_refresh_ingest_models::DedupMode;

#[derive(Debug, Default)]
struct Accumulated {
    set: AccumulatedSet,
    keys: HashSet<IdentityKey>,
}

impl Accumulated {
    fn push(&mut self, record: CatalogRecord) {
        self.keys.insert(record.identity_key());
        self.set.push(record);
    }
}

/// Shared accumulator that every fetch task feeds pages into.
#[derive(Debug)]
pub struct Deduplicator {
    mode: DedupMode,
    inner: Mutex<Accumulated>,
}

fn skip(record: &CatalogRecord) {
    log::trace!("Skipping duplicate {} {:?}", record.kind(), record.name());
}

impl Deduplicator {
    /// Creates an empty deduplicator that accumulates pages using `mode`.
    #[must_use]
    pub fn new(mode: DedupMode) -> Self {
        Self {
            mode,
            inner: Mutex::new(Accumulated::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Accumulated> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a record with the same identity key has been accumulated.
    #[must_use]
    pub fn exists(&self, candidate: &CatalogRecord) -> bool {
        self.lock().keys.contains(&candidate.identity_key())
    }

    /// Returns the items not yet accumulated, judged against the set as it
    /// stands now. Items are not checked against each other.
    #[must_use]
    pub fn filter_new(&self, items: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
        let inner = self.lock();
        items
            .into_iter()
            .filter(|item| {
                let fresh = !inner.keys.contains(&item.identity_key());
                if !fresh {
                    skip(item);
                }
                fresh
            })
            .collect()
    }

    /// Appends `items` unconditionally.
    pub fn append(&self, items: Vec<CatalogRecord>) {
        let mut inner = self.lock();
        for item in items {
            inner.push(item);
        }
    }

    /// Accumulates every item that is not a duplicate and returns how many
    /// were appended.
    ///
    /// With [`DedupMode::CheckThenAppend`] this is [`Self::filter_new`]
    /// followed by [`Self::append`], each taking the lock on its own.
    /// Concurrent callers can both pass the check for the same entry.
    pub fn record(&self, items: Vec<CatalogRecord>) -> usize {
        match self.mode {
            DedupMode::CheckThenAppend => {
                let fresh = self.filter_new(items);
                let count = fresh.len();
                self.append(fresh);
                count
            }
            DedupMode::Atomic => self.record_atomic(items),
        }
    }

    fn record_atomic(&self, items: Vec<CatalogRecord>) -> usize {
        let mut inner = self.lock();
        let mut count = 0;
        for item in items {
            if inner.keys.contains(&item.identity_key()) {
                skip(&item);
            } else {
                inner.push(item);
                count += 1;
            }
        }
        count
    }

    /// Number of accumulated records of `kind`.
    #[must_use]
    pub fn len(&self, kind: EntityKind) -> usize {
        self.lock().set.len(kind)
    }

    /// Consumes the deduplicator and returns everything it accumulated.
    #[must_use]
    pub fn into_accumulated(self) -> AccumulatedSet {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .set
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupMode::default())
    }
}
