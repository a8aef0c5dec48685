//! File Record Storage
//!
//! One JSON document per node on local disk. Filenames are derived from a
//! SHA-256 of the node so arbitrary node strings are safe on any filesystem.

use crate::error::{Error, Result};
use crate::registry::record::Registration;
use crate::registry::storage::RecordStorage;
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "json";

// =============================================================================
// File Storage Configuration
// =============================================================================

/// Configuration for file storage
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Root directory for record files
    pub root_path: PathBuf,
    /// Whether to fsync each write
    pub sync_writes: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./push-broker-data"),
            sync_writes: false,
        }
    }
}

// =============================================================================
// File Storage
// =============================================================================

/// Record storage on local disk
pub struct FileStorage {
    /// Root directory for record files
    root_path: PathBuf,
    /// Index of stored records (node -> file path)
    index: RwLock<HashMap<String, PathBuf>>,
    /// Current record count
    entry_count: AtomicU64,
    /// Whether to sync writes
    sync_writes: bool,
}

impl FileStorage {
    /// Open file storage at the given root path
    pub async fn with_path(root_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(FileStorageConfig {
            root_path: root_path.into(),
            ..Default::default()
        })
        .await
    }

    /// Open file storage with full config
    pub async fn with_config(config: FileStorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.root_path).await?;

        let storage = Self {
            root_path: config.root_path,
            index: RwLock::new(HashMap::new()),
            entry_count: AtomicU64::new(0),
            sync_writes: config.sync_writes,
        };

        storage.rebuild_index().await?;

        Ok(storage)
    }

    /// Rebuild index from disk
    async fn rebuild_index(&self) -> Result<()> {
        let mut rebuilt = HashMap::new();

        let mut root_entries = fs::read_dir(&self.root_path).await?;
        while let Some(root_entry) = root_entries.next_entry().await? {
            let shard_path = root_entry.path();
            if !shard_path.is_dir() {
                continue;
            }

            let mut shard_entries = match fs::read_dir(&shard_path).await {
                Ok(e) => e,
                Err(_) => continue,
            };

            while let Some(entry) = shard_entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e != RECORD_EXTENSION).unwrap_or(true) {
                    continue;
                }

                match read_record(&path).await {
                    Ok(record) => {
                        rebuilt.insert(record.node, path);
                    }
                    Err(e) => warn!("Skipping unreadable record file {}: {}", path.display(), e),
                }
            }
        }

        debug!("Indexed {} record files under {}", rebuilt.len(), self.root_path.display());
        self.entry_count.store(rebuilt.len() as u64, Ordering::Relaxed);
        *self.index.write() = rebuilt;

        Ok(())
    }

    /// Get file path for a node
    fn file_path(&self, node: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(node.as_bytes()));
        self.root_path
            .join(&digest[..2])
            .join(format!("{}.{}", digest, RECORD_EXTENSION))
    }

    /// Get root path
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

async fn read_record(path: &Path) -> Result<Registration> {
    let json = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

#[async_trait]
impl RecordStorage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, node: &str) -> Result<Option<Registration>> {
        let path = {
            let index = self.index.read();
            match index.get(node) {
                Some(path) => path.clone(),
                None => return Ok(None),
            }
        };

        let record = read_record(&path).await?;
        if record.node != node {
            return Err(Error::Storage(format!(
                "record file {} holds node {}, expected {}",
                path.display(),
                record.node,
                node
            )));
        }

        Ok(Some(record))
    }

    async fn put(&self, record: &Registration) -> Result<()> {
        let path = self.file_path(&record.node);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename over the target
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(record)?;
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&json).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        drop(file);
        fs::rename(&tmp_path, &path).await?;

        if self.index.write().insert(record.node.clone(), path).is_none() {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    async fn delete(&self, node: &str) -> Result<Option<Registration>> {
        let path = match self.index.read().get(node) {
            Some(p) => p.clone(),
            None => return Ok(None),
        };

        // The index only forgets the node once its file is gone
        let record = read_record(&path).await.ok();
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Record file {} already gone", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        if self.index.write().remove(node).is_some() {
            self.entry_count.fetch_sub(1, Ordering::Relaxed);
        }

        Ok(record)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.index.read().keys().cloned().collect())
    }

    fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    async fn health_check(&self) -> Result<bool> {
        let probe = self.root_path.join(".health_check");
        match fs::write(&probe, b"ok").await {
            Ok(()) => {
                let _ = fs::remove_file(&probe).await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}
