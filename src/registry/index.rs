//! Reverse Token Index
//!
//! Lazily built token -> node map used to resolve unregister-by-token
//! requests. Tokens are not indexed by the backing storage, so a miss costs a
//! full scan; every pair seen during the scan is kept so repeated lookups get
//! cheaper. Entries are only dropped when the store rewrites or deletes the
//! record that produced them, so a lookup may briefly return a node whose
//! token has since changed. Callers must re-check the record they load.

use crate::registry::store::RegistrationStore;
use dashmap::DashMap;
use tracing::debug;

/// Derived token -> node cache
#[derive(Debug, Default)]
pub struct TokenIndex {
    entries: DashMap<String, String>,
}

impl TokenIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node for a token, without scanning
    pub fn cached(&self, token: &str) -> Option<String> {
        self.entries.get(token).map(|r| r.value().clone())
    }

    /// Forget a token
    pub fn invalidate(&self, token: &str) {
        if self.entries.remove(token).is_some() {
            debug!("Invalidated reverse index entry for a token");
        }
    }

    /// Forget every token that resolves to `node`
    pub fn invalidate_node(&self, node: &str) {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached != node);
        debug!(
            "Invalidated {} reverse index entries for node {}",
            before.saturating_sub(self.entries.len()),
            node
        );
    }

    pub(crate) fn remember(&self, token: String, node: String) {
        self.entries.insert(token, node);
    }

    /// Number of cached tokens
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a token, scanning the store on a miss
    ///
    /// The scan stops at the first record carrying `token`; every record read
    /// before it is indexed as well.
    pub(crate) async fn resolve(&self, store: &RegistrationStore, token: &str) -> Option<String> {
        if let Some(node) = self.cached(token) {
            return Some(node);
        }

        let nodes = store.list().await;
        debug!("Reverse index miss, scanning {} nodes", nodes.len());

        for node in nodes {
            let Some(record) = store.get(&node).await else {
                continue;
            };

            let found = record.token == token;
            self.remember(record.token, node.clone());
            if found {
                return Some(node);
            }
        }

        None
    }
}
