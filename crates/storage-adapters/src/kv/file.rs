//! # File-backed key-value store
//!
//! One file per key under a root directory. Writes go to a temporary sibling
//! and are renamed into place, so a crash never leaves a half-written value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domains::KeyValueStore;
use tokio::fs;
use tracing::debug;

use crate::errors::CacheError;

const VALUE_EXT: &str = "json";

pub struct FileKeyValueStore {
    /// Root directory for all keys (e.g. "./data/cache")
    root_path: PathBuf,
    quota: Option<usize>,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
            quota: None,
        }
    }

    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Keys map to file names reversibly: `[A-Za-z0-9.-]` is kept, every other
    /// byte becomes `_xx`.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{byte:02x}"));
            }
        }
        self.root_path.join(format!("{name}.{VALUE_EXT}"))
    }

    /// Bytes stored under the root, excluding `skip`.
    async fn used_bytes(&self, skip: &Path) -> Result<usize, CacheError> {
        let mut total = 0usize;
        let mut dir = match fs::read_dir(&self.root_path).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path == skip || path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            total += entry.metadata().await?.len() as usize;
        }
        Ok(total)
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CacheError::Io(err).into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let target = self.path_for(key);
        if let Some(quota) = self.quota {
            let needed = self.used_bytes(&target).await? + value.len();
            if needed > quota {
                return Err(CacheError::QuotaExceeded { needed, quota }.into());
            }
        }

        fs::create_dir_all(&self.root_path)
            .await
            .map_err(CacheError::Io)?;
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, value).await.map_err(CacheError::Io)?;
        fs::rename(&tmp, &target).await.map_err(CacheError::Io)?;
        debug!(key, bytes = value.len(), "cache value written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Io(err).into()),
        }
    }
}
