use async_trait::async_trait;
use dashmap::DashMap;
use domains::KeyValueStore;

use crate::errors::CacheError;

/// Process-local key-value store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
    /// Budget over the sum of key and value lengths, in bytes
    quota: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota: Some(quota),
        }
    }

    /// Bytes currently held, excluding `skip_key`.
    fn used_bytes(&self, skip_key: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.key() != skip_key)
            .map(|e| e.key().len() + e.value().len())
            .sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes(key) + key.len() + value.len();
            if needed > quota {
                return Err(CacheError::QuotaExceeded { needed, quota }.into());
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
