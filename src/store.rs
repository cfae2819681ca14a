//! Processed-key store
//!
//! An append-only text log (one key per line) with an in-memory mirror for
//! O(1) membership tests. The whole file is loaded once at startup and only
//! ever grows; a key that is in the mirror has already been flushed to disk.
//!
//! Ordering of writes goes through one async mutex that owns the open append
//! handle, so concurrent records cannot interleave partial appends. The
//! append is synced before `record` returns: a crash can lose at most the
//! dispatch-to-record window, which re-dispatches on the next poll
//! (at-least-once dispatch, at-most-once recording).

use crate::error::Result;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct StoreInner {
    /// Keys in file order
    keys: Vec<String>,
    /// Membership index over `keys`
    index: HashSet<String>,
    /// Append handle, opened once at load and kept for the store's lifetime
    file: File,
}

/// Durable set of keys already acted upon
pub struct ProcessedStore {
    inner: Mutex<StoreInner>,
}

impl ProcessedStore {
    /// Load the log from disk; a missing file is an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut keys = Vec::new();
        let mut index = HashSet::new();
        match tokio::fs::read_to_string(path).await {
            Ok(data) => {
                for line in data.lines() {
                    // A hand-edited log may repeat a key; count it once
                    if !line.is_empty() && index.insert(line.to_string()) {
                        keys.push(line.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        tracing::info!("Loaded {} processed keys from {}", keys.len(), path.display());

        Ok(Self {
            inner: Mutex::new(StoreInner { keys, index, file }),
        })
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.index.contains(key)
    }

    /// Append a key to the log and the mirror. Returns false if the key was
    /// already present (nothing written). The file write is synced before
    /// the mirror is updated, so the mirror never claims more than the disk
    /// holds.
    pub async fn record(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.index.contains(key) {
            return Ok(false);
        }

        inner.file.write_all(format!("{}\n", key).as_bytes()).await?;
        inner.file.sync_data().await?;

        inner.keys.push(key.to_string());
        inner.index.insert(key.to_string());
        Ok(true)
    }

    /// Keys in recorded order
    pub async fn keys(&self) -> Vec<String> {
        self.inner.lock().await.keys.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.keys.len()
    }
}
