//! In-memory dedup index.
//!
//! Seeded from the store at the start of a run, consulted for every
//! fetched record. Appends during the run never create duplicates
//! against what was loaded; duplicates already on disk from earlier
//! interrupted runs are collapsed at finalization instead.

use std::collections::HashSet;

use crate::model::{RawRecord, RecordKind};

#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the index with the identities already present in a store.
    #[must_use]
    pub fn from_records(records: &[RawRecord], kind: RecordKind) -> Self {
        let seen = records
            .iter()
            .filter_map(|record| kind.identity(record))
            .collect();
        Self { seen }
    }

    /// Record an identity. Returns `true` when it was not seen before.
    pub fn insert(&mut self, identity: String) -> bool {
        self.seen.insert(identity)
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
