//! Registration Storage Backends
//!
//! Durable storage layers beneath the registration store.

mod file;
mod memory;

pub use file::{FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;

use crate::error::Result;
use crate::registry::record::Registration;
use async_trait::async_trait;

// =============================================================================
// RecordStorage Trait
// =============================================================================

/// Trait for the durable record store
///
/// Backends know nothing about caching or the token index; the
/// [`RegistrationStore`](crate::registry::RegistrationStore) layers those on top.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Backend name for logs and errors
    fn name(&self) -> &'static str;

    /// Load the record for a node
    async fn get(&self, node: &str) -> Result<Option<Registration>>;

    /// Store (insert or replace) a record
    async fn put(&self, record: &Registration) -> Result<()>;

    /// Delete the record for a node
    ///
    /// Returns the deleted record if it existed.
    async fn delete(&self, node: &str) -> Result<Option<Registration>>;

    /// Get all stored node identifiers
    ///
    /// Note: This may be expensive for large stores.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Get current record count
    fn entry_count(&self) -> u64;

    /// Check if storage is available/healthy
    async fn health_check(&self) -> Result<bool>;
}

/// Type alias for shared record storage
pub type SharedRecordStorage = std::sync::Arc<dyn RecordStorage>;
