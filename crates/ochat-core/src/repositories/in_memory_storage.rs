use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{RepositoryError, RepositoryResult};
use super::storage_backend::{BoxFuture, StorageBackend};

/// In-memory key/value storage.
/// Clones share the same entries, which is how two sessions in one process
/// see the same profile. Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total size (keys plus values, in bytes), like a browser's
    /// per-origin storage limit.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write a raw value, bypassing the quota (used to plant corrupt payloads in tests).
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}

fn used_bytes(entries: &HashMap<String, String>, skip_key: &str) -> usize {
    entries
        .iter()
        .filter(|(k, _)| k.as_str() != skip_key)
        .map(|(k, v)| k.len() + v.len())
        .sum()
}

impl StorageBackend for InMemoryStorage {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let value = self.entries.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let entries = self.entries.clone();
        let quota = self.quota_bytes;
        let key = key.to_string();

        Box::pin(async move {
            let mut store = entries.lock();

            if let Some(quota) = quota {
                let needed = key.len() + value.len();
                let available = quota.saturating_sub(used_bytes(&store, &key));
                if needed > available {
                    return Err(RepositoryError::QuotaExceeded {
                        message: format!(
                            "{} bytes requested for {:?}, {} available",
                            needed, key, available
                        ),
                    });
                }
            }

            store.insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let entries = self.entries.clone();
        let key = key.to_string();

        Box::pin(async move {
            entries.lock().remove(&key);
            Ok(())
        })
    }

    fn keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let keys = self.entries.lock().keys().cloned().collect();
        Box::pin(async move { Ok(keys) })
    }
}
