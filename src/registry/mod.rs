//! Registration Registry Module
//!
//! Durable node -> registration mapping with a read cache, a lazily built
//! reverse token index and lifecycle events.

pub mod cache;
pub mod events;
pub mod index;
pub mod record;
pub mod storage;
pub mod store;

pub use cache::{CacheLookup, CacheStatsSnapshot, RecordCache};
pub use events::*;
pub use index::TokenIndex;
pub use record::Registration;
pub use storage::{
    FileStorage, FileStorageConfig, MemoryStorage, RecordStorage, SharedRecordStorage,
};
pub use store::RegistrationStore;
