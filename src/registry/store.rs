//! Registration Store
//!
//! Owns every read and write of registration records. Layers a read-through
//! [`RecordCache`] and the derived [`TokenIndex`] over a durable
//! [`RecordStorage`] backend, and broadcasts [`RegistryEvent`]s.

use crate::error::{Error, Result};
use crate::registry::cache::{CacheLookup, CacheStatsSnapshot, RecordCache};
use crate::registry::events::RegistryEvent;
use crate::registry::index::TokenIndex;
use crate::registry::record::Registration;
use crate::registry::storage::SharedRecordStorage;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Registration Store
// =============================================================================

/// Cached, indexed registration store
pub struct RegistrationStore {
    /// Durable backend, the authority of record
    backend: SharedRecordStorage,
    /// Node -> record cache
    cache: RecordCache,
    /// Token -> node cache
    index: TokenIndex,
    /// Serializes read-modify-write sequences
    mutation_lock: Mutex<()>,
    /// Event broadcaster
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl RegistrationStore {
    /// Create a store over a backend, with empty caches
    pub fn new(backend: SharedRecordStorage) -> Arc<Self> {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Arc::new(Self {
            backend,
            cache: RecordCache::new(),
            index: TokenIndex::new(),
            mutation_lock: Mutex::new(()),
            event_sender,
        })
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }

    pub(crate) fn emit(&self, event: RegistryEvent) {
        let _ = self.event_sender.send(event);
    }

    /// Acquire the mutation lock
    ///
    /// Held across load, check and write so concurrent requests for the same
    /// node cannot interleave.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutation_lock.lock().await
    }

    /// Load the record for a node
    ///
    /// Storage read failures are logged and reported as "no record". They are
    /// not cached, so the next call retries the backend.
    pub async fn get(&self, node: &str) -> Option<Registration> {
        match self.load(node).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read node {} from {} storage: {}", node, self.backend.name(), e);
                None
            }
        }
    }

    /// Cached or backend read that keeps read failures distinct from absence
    ///
    /// Only live records are cached on a backend read. Absence is cached only
    /// by an in-process delete, so lookups of unknown nodes never grow the cache.
    async fn load(&self, node: &str) -> Result<Option<Registration>> {
        match self.cache.lookup(node) {
            CacheLookup::Present(record) => return Ok(Some(record)),
            CacheLookup::Absent => return Ok(None),
            CacheLookup::Miss => {}
        }

        let record = self.backend.get(node).await?;
        if let Some(record) = &record {
            debug!("Loaded node {} from {} storage", node, self.backend.name());
            self.cache.insert(node, Some(record.clone()));
        }
        Ok(record)
    }

    /// Persist a record for a node, or delete it when `record` is `None`
    ///
    /// The reverse index entry of the prior token is dropped before the write
    /// whenever the token changes or the record goes away. If the prior record
    /// cannot be read, every index entry pointing at the node is dropped.
    pub async fn set(&self, node: &str, record: Option<Registration>) -> Result<()> {
        if let Some(record) = &record {
            if record.node != node {
                return Err(Error::Internal(format!(
                    "record for node {} stored under key {}",
                    record.node, node
                )));
            }
        }

        match self.load(node).await {
            Ok(Some(prior)) => {
                let token_kept = record
                    .as_ref()
                    .map(|r| r.token == prior.token)
                    .unwrap_or(false);
                if !token_kept {
                    self.index.invalidate(&prior.token);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "Prior record for node {} unreadable ({}), dropping its index entries",
                    node, e
                );
                self.index.invalidate_node(node);
            }
        }

        let written = match &record {
            Some(record) => self.backend.put(record).await,
            None => self.backend.delete(node).await.map(|_| ()),
        };

        if let Err(e) = written {
            error!("Failed to write node {} to {} storage: {}", node, self.backend.name(), e);
            return Err(match e {
                Error::Storage(_) | Error::StorageUnavailable { .. } => e,
                other => Error::Storage(other.to_string()),
            });
        }

        self.cache.insert(node, record);
        Ok(())
    }

    /// Enumerate all known nodes (unordered)
    pub async fn list(&self) -> Vec<String> {
        match self.backend.keys().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Failed to list {} storage: {}", self.backend.name(), e);
                Vec::new()
            }
        }
    }

    /// Resolve a token to the node that registered it
    pub async fn token_to_node(&self, token: &str) -> Option<String> {
        self.index.resolve(self, token).await
    }

    /// Get the reverse token index
    pub fn index(&self) -> &TokenIndex {
        &self.index
    }

    /// Get cache counters
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Number of stored records
    pub fn node_count(&self) -> u64 {
        self.backend.entry_count()
    }

    /// Backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check backend health
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await.unwrap_or(false)
    }
}
