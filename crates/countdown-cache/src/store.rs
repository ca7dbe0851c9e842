//! Durable persistence for the cache index

use crate::error::{CacheError, Result};
use crate::types::CacheIndex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Reads and writes the cache index as a single JSON file.
///
/// The file holds an object keyed by decimal bucket strings, with
/// `{"filePath": ..., "expiresAt": ...}` values. This store is the only
/// component that touches the file.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index from disk.
    ///
    /// A missing file yields an empty index. Unreadable or unparseable
    /// content is logged and also yields an empty index; the next save
    /// rewrites the file.
    pub async fn load(&self) -> CacheIndex {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CacheIndex::new();
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read index file, starting empty");
                return CacheIndex::new();
            }
        };

        match serde_json::from_slice::<CacheIndex>(&data) {
            Ok(index) => {
                debug!(path = ?self.path, entries = index.len(), "Loaded cache index");
                index
            }
            Err(e) => {
                let err = CacheError::CorruptStore(e.to_string());
                warn!(path = ?self.path, error = %err, "Recovering with empty index");
                CacheIndex::new()
            }
        }
    }

    /// Persist the whole index, replacing the file atomically.
    pub async fn save(&self, index: &CacheIndex) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| CacheError::StoreWrite(Box::new(std::io::Error::other(e))))?;

        // Write to a sibling temp file and rename over the target, so a
        // reader never sees a partially written index.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| CacheError::StoreWrite(Box::new(e)))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CacheError::StoreWrite(Box::new(e)))?;

        debug!(path = ?self.path, entries = index.len(), "Saved cache index");
        Ok(())
    }
}
