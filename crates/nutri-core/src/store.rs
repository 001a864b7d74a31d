//! Key-value persistence capability: Sled on disk, DashMap in memory.
//!
//! Plays the role of browser local storage. Both the credential record and
//! the local record store live here as single JSON blobs under fixed keys.

use crate::error::StoreError;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_STORE_PATH: &str = "./data/nutri_store";

/// Byte-level key-value store. Whole-value reads and writes only.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Durable store backed by a Sled database.
pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    /// Opens or creates the store at the given path, or `./data/nutri_store` when `None`.
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self, StoreError> {
        let p = path
            .map(|x| x.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new(DEFAULT_STORE_PATH).to_path_buf());
        let db = sled::open(p)?;
        Ok(Self { db })
    }
}

impl KvStore for SledKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

/// Process-local store. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
