//! Credential Store: the persisted configuration record.
//!
//! One JSON document under `nutri-ai-config`. Reads of missing or corrupt data
//! yield an empty record; write failures are logged and dropped. No validation
//! happens here.

use crate::capability::Capability;
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CREDENTIALS_KEY: &str = "nutri-ai-config";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub is_configured: bool,
    /// Set for signing secrets the resolver produced itself.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub generated: bool,
}

impl StoredEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            is_configured: true,
            generated: false,
        }
    }

    pub fn generated(value: impl Into<String>) -> Self {
        Self {
            generated: true,
            ..Self::new(value)
        }
    }
}

/// Shape of the stored blob: `{ai, database, signingSecret?, timestamp}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(default)]
    pub ai: Option<StoredEntry>,
    #[serde(default)]
    pub database: Option<StoredEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<StoredEntry>,
    /// Milliseconds since the Unix epoch at the last save.
    #[serde(default)]
    pub timestamp: i64,
}

impl StoredRecord {
    pub fn entry(&self, capability: Capability) -> Option<&StoredEntry> {
        match capability {
            Capability::Ai => self.ai.as_ref(),
            Capability::Database => self.database.as_ref(),
            Capability::SigningSecret => self.signing_secret.as_ref(),
        }
    }

    pub fn set(&mut self, capability: Capability, entry: Option<StoredEntry>) {
        match capability {
            Capability::Ai => self.ai = entry,
            Capability::Database => self.database = entry,
            Capability::SigningSecret => self.signing_secret = entry,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ai.is_none() && self.database.is_none() && self.signing_secret.is_none()
    }
}

/// Best-effort persistence of [`StoredRecord`] over any [`KvStore`].
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> StoredRecord {
        let bytes = match self.kv.get(CREDENTIALS_KEY) {
            Ok(Some(b)) => b,
            Ok(None) => return StoredRecord::default(),
            Err(e) => {
                tracing::warn!(target: "nutri::credentials", "Failed to read stored configuration: {}", e);
                return StoredRecord::default();
            }
        };
        match serde_json::from_slice::<StoredRecord>(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    target: "nutri::credentials",
                    "Stored configuration is unreadable, treating as empty: {}",
                    e
                );
                StoredRecord::default()
            }
        }
    }

    /// Overwrites the whole record, stamping the current time.
    pub fn save(&self, record: &StoredRecord) {
        let mut record = record.clone();
        record.timestamp = chrono::Utc::now().timestamp_millis();
        let result = serde_json::to_vec(&record)
            .map_err(crate::error::StoreError::from)
            .and_then(|bytes| self.kv.put(CREDENTIALS_KEY, &bytes));
        if let Err(e) = result {
            tracing::warn!(target: "nutri::credentials", "Failed to save configuration: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(CREDENTIALS_KEY) {
            tracing::warn!(target: "nutri::credentials", "Failed to clear stored configuration: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryKv;

    struct FailingKv;

    impl KvStore for FailingKv {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Sled(sled::Error::Unsupported("quota".into())))
        }
        fn put(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Sled(sled::Error::Unsupported("quota".into())))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Sled(sled::Error::Unsupported("quota".into())))
        }
    }

    #[test]
    fn empty_storage_loads_empty_record() {
        let store = CredentialStore::new(Arc::new(MemoryKv::new()));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_blob_loads_empty_record() {
        let kv = MemoryKv::new();
        kv.put(CREDENTIALS_KEY, b"{not json").unwrap();
        let store = CredentialStore::new(Arc::new(kv));
        assert_eq!(store.load(), StoredRecord::default());
    }

    #[test]
    fn save_overwrites_and_stamps_timestamp() {
        let store = CredentialStore::new(Arc::new(MemoryKv::new()));
        let mut record = StoredRecord::default();
        record.set(Capability::Database, Some(StoredEntry::new("postgresql://a")));
        store.save(&record);

        let mut second = StoredRecord::default();
        second.set(Capability::Ai, Some(StoredEntry::new("k")));
        store.save(&second);

        let loaded = store.load();
        assert!(loaded.database.is_none());
        assert_eq!(loaded.ai.as_ref().and_then(|e| e.value.as_deref()), Some("k"));
        assert!(loaded.timestamp > 0);
    }

    #[test]
    fn clear_removes_record() {
        let store = CredentialStore::new(Arc::new(MemoryKv::new()));
        let mut record = StoredRecord::default();
        record.set(Capability::Ai, Some(StoredEntry::new("k")));
        store.save(&record);
        store.clear();
        assert!(store.load().is_empty());
    }

    #[test]
    fn backend_failures_are_swallowed() {
        let store = CredentialStore::new(Arc::new(FailingKv));
        store.save(&StoredRecord::default());
        store.clear();
        assert!(store.load().is_empty());
    }

    #[test]
    fn stored_shape_matches_page_format() {
        let json = r#"{"ai":{"value":"abc","isConfigured":true},"database":{"value":null,"isConfigured":false},"timestamp":1700000000000}"#;
        let record: StoredRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.ai.unwrap().value.as_deref(), Some("abc"));
        assert_eq!(record.database.unwrap().value, None);
        assert!(record.signing_secret.is_none());
    }
}
