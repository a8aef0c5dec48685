//! In-Memory Record Storage
//!
//! Ephemeral storage backed by DashMap. Used for tests and for deployments
//! that accept losing registrations on restart.

use crate::error::{Error, Result};
use crate::registry::record::Registration;
use crate::registry::storage::RecordStorage;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// Memory Storage
// =============================================================================

/// In-memory record storage backed by DashMap
pub struct MemoryStorage {
    /// Records keyed by node
    records: DashMap<String, Registration>,
    /// Current record count
    entry_count: AtomicU64,
    /// Is backend available
    available: AtomicBool,
}

impl MemoryStorage {
    /// Create empty memory storage
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            entry_count: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Set availability (for testing failure paths)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::StorageUnavailable {
                backend: self.name().to_string(),
            })
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, node: &str) -> Result<Option<Registration>> {
        self.ensure_available()?;
        Ok(self.records.get(node).map(|r| r.value().clone()))
    }

    async fn put(&self, record: &Registration) -> Result<()> {
        self.ensure_available()?;
        if self
            .records
            .insert(record.node.clone(), record.clone())
            .is_none()
        {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn delete(&self, node: &str) -> Result<Option<Registration>> {
        self.ensure_available()?;
        if let Some((_, record)) = self.records.remove(node) {
            self.entry_count.fetch_sub(1, Ordering::Relaxed);
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        Ok(self.records.iter().map(|r| r.key().clone()).collect())
    }

    fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::Relaxed))
    }
}

// =============================================================================
// Tests
// =============================================================================
