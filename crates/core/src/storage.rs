//! Key/value storage backends
//!
//! The admin client keeps credentials and session data in two stores with
//! the same shape: a persistent one (tokens, remembered email) and a
//! process-lifetime one (user snapshot, CSRF token).

use crate::error::CoreResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> CoreResult<()>;
    async fn remove(&self, key: &str) -> CoreResult<()>;

    /// Write several entries as one change.
    ///
    /// Backends that can persist atomically override this; the default
    /// writes entries one at a time.
    async fn set_many(&self, entries: Vec<(String, String)>) -> CoreResult<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    /// Remove several keys as one change.
    async fn remove_many(&self, keys: &[&str]) -> CoreResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// In-memory storage, the counterpart of browser session storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> CoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> CoreResult<()> {
        let mut guard = self.entries.write().await;
        guard.extend(entries);
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> CoreResult<()> {
        let mut guard = self.entries.write().await;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

/// JSON file backed storage, the counterpart of browser local storage.
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> CoreResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::trace!(path = %self.path.display(), keys = entries.len(), "Persisted storage");
        Ok(())
    }

    async fn update<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        f(&mut entries);
        self.persist(&entries).await
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> CoreResult<()> {
        let key = key.to_string();
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }

    async fn set_many(&self, new_entries: Vec<(String, String)>) -> CoreResult<()> {
        self.update(move |entries| entries.extend(new_entries)).await
    }

    async fn remove_many(&self, keys: &[&str]) -> CoreResult<()> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
        .await
    }
}

// Mock implementation for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub KeyValueStorage {}

        #[async_trait]
        impl KeyValueStorage for KeyValueStorage {
            async fn get(&self, key: &str) -> CoreResult<Option<String>>;
            async fn set(&self, key: &str, value: String) -> CoreResult<()>;
            async fn remove(&self, key: &str) -> CoreResult<()>;
        }
    }
}
