//! Record Cache
//!
//! In-process read-through cache of registration records, keyed by node.
//! Nodes deleted in-process are remembered as absent. There is no eviction:
//! the cache grows with the number of nodes registered in this process.

use crate::registry::record::Registration;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Cached live record
    Present(Registration),
    /// Cached knowledge that the node has no record
    Absent,
    /// Nothing cached for this node
    Miss,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Guarded node -> record map
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: RwLock<HashMap<String, Option<Registration>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RecordCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node
    pub fn lookup(&self, node: &str) -> CacheLookup {
        match self.entries.read().get(node) {
            Some(Some(record)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Present(record.clone())
            }
            Some(None) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Absent
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
        }
    }

    /// Cache a record, or the absence of one
    pub fn insert(&self, node: &str, record: Option<Registration>) {
        self.entries.write().insert(node.to_string(), record);
    }

    /// Get counters
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
