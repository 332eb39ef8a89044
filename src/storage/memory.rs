// In-memory shortcut index. Built off to the side by the loader and then
// published as a whole, so readers never see a half-built index.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::ShortcutRecord;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexMetadata {
    pub total_records: usize,
    pub total_sources: usize,
    pub duplicates_dropped: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self {
            total_records: 0,
            total_sources: 0,
            duplicates_dropped: 0,
            files_loaded: 0,
            files_failed: 0,
            generation: 0,
            built_at: Utc::now(),
        }
    }
}

/// Normalized shortcut index with two views kept in lockstep:
/// composite key -> record, and source -> records.
#[derive(Debug, Clone, Default)]
pub struct ShortcutIndex {
    // Core data, in load order
    records: Vec<Arc<ShortcutRecord>>,

    // Fast indexes
    by_key: HashMap<String, Arc<ShortcutRecord>>,
    by_source: HashMap<String, Vec<Arc<ShortcutRecord>>>,

    metadata: IndexMetadata,
}

impl ShortcutIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in load order.
    pub fn all(&self) -> Vec<Arc<ShortcutRecord>> {
        self.records.clone()
    }

    pub fn records(&self) -> &[Arc<ShortcutRecord>] {
        &self.records
    }

    pub fn get(&self, key: &str) -> Option<&Arc<ShortcutRecord>> {
        self.by_key.get(key)
    }

    pub fn source(&self, source: &str) -> Option<&[Arc<ShortcutRecord>]> {
        self.by_source.get(source).map(Vec::as_slice)
    }

    /// Copy of the source grouping. Mutating it does not touch the index.
    pub fn by_source(&self) -> HashMap<String, Vec<Arc<ShortcutRecord>>> {
        self.by_source.clone()
    }

    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_source.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn generation(&self) -> u64 {
        self.metadata.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.metadata.generation = generation;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records for a fresh index. Every build starts empty, so a
/// reload is a full rebuild rather than a merge.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: ShortcutIndex,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its composite key. The first writer for a key
    /// wins; later duplicates are dropped from both views and `false` is
    /// returned.
    pub fn insert(&mut self, record: ShortcutRecord) -> bool {
        let key = record.composite_key();
        if self.index.by_key.contains_key(&key) {
            self.index.metadata.duplicates_dropped += 1;
            return false;
        }

        let record = Arc::new(record);
        self.index
            .by_source
            .entry(record.source.clone())
            .or_default()
            .push(Arc::clone(&record));
        self.index.by_key.insert(key, Arc::clone(&record));
        self.index.records.push(record);
        true
    }

    pub fn file_loaded(&mut self) {
        self.index.metadata.files_loaded += 1;
    }

    pub fn file_failed(&mut self) {
        self.index.metadata.files_failed += 1;
    }

    pub fn len(&self) -> usize {
        self.index.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.records.is_empty()
    }

    pub fn finish(mut self) -> ShortcutIndex {
        self.index.metadata.total_records = self.index.records.len();
        self.index.metadata.total_sources = self.index.by_source.len();
        self.index.metadata.built_at = Utc::now();
        self.index
    }
}
