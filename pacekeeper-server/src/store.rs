//! Durable key-value storage behind the actors
//!
//! Actors only need two operations, `get` and `put`, with read-after-write
//! consistency for a key as seen by a single actor. Absence and failure are
//! distinct: `Ok(None)` means the key was never written, while
//! [`StoreError`] means the store could not answer.
//!
//! # Store Types
//!
//! ## Memory Store
//! - Process-local map, lost on restart
//! - Best for: Development and tests
//!
//! ## File Store
//! - A single JSON document on disk, rewritten atomically on every put
//! - Best for: Single-node deployments that must survive restarts

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreConfig, StoreType};

/// Errors raised by a [`KvStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be reached or written
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backing storage holds data that cannot be decoded
    #[error("store corrupt: {0}")]
    Corrupt(String),
}

/// Minimal durable key-value interface consumed by the actors
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key; `Ok(None)` if it was never written
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key, visible to subsequent `get`s once this returns
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<AHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisting every entry into one JSON file
///
/// The file is loaded on first use and cached. A failed load is reported to
/// the caller and retried on the next access.
pub struct FileStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: tokio::sync::Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Unavailable(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        let unavailable = |e: std::io::Error| {
            StoreError::Unavailable(format!("{}: {e}", self.path.display()))
        };
        tokio::fs::write(&tmp, contents).await.map_err(unavailable)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };

        let previous = entries.insert(key.to_string(), value);
        match self.persist(&entries).await {
            Ok(()) => {
                *guard = Some(entries);
                Ok(())
            }
            Err(e) => {
                // Keep the cache in step with what is on disk
                match previous {
                    Some(old) => entries.insert(key.to_string(), old),
                    None => entries.remove(key),
                };
                *guard = Some(entries);
                Err(e)
            }
        }
    }
}

/// Create the store selected by configuration
///
/// # Example
///
/// ```ignore
/// let config = StoreConfig {
///     store_type: StoreType::File,
///     path: "pacekeeper-data.json".into(),
/// };
/// let store = create_store(&config);
/// ```
pub fn create_store(config: &StoreConfig) -> Arc<dyn KvStore> {
    match config.store_type {
        StoreType::Memory => Arc::new(MemoryStore::new()),
        StoreType::File => Arc::new(FileStore::new(&config.path)),
    }
}
