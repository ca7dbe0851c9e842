//! Generation cache for countdown GIFs, keyed by minute bucket

use crate::error::{CacheError, Result};
use crate::store::IndexStore;
use crate::types::{bucket_key, CacheEntry, CacheIndex, MATCH_TOLERANCE_SECS};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Produces a countdown artifact for a target timestamp at the given path.
///
/// The cache treats rendering as opaque; it only cares that the file exists
/// at `output` once `render` returns Ok.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, target: i64, output: &Path) -> Result<()>;
}

/// Orchestrates lookup, eviction, generation and persistence.
///
/// Every request runs load -> sweep -> lookup -> (render) -> persist as one
/// critical section under a single mutex, so at most one generation is ever
/// in flight per bucket key and index writes never clobber each other.
pub struct CountdownCache<R: Renderer> {
    store: IndexStore,
    gif_dir: PathBuf,
    renderer: R,
    render_timeout: Duration,
    lock: Mutex<()>,
}

impl<R: Renderer> CountdownCache<R> {
    pub fn new(store: IndexStore, gif_dir: PathBuf, renderer: R, render_timeout: Duration) -> Self {
        Self {
            store,
            gif_dir,
            renderer,
            render_timeout,
            lock: Mutex::new(()),
        }
    }

    /// Ensure the artifact directory exists.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.gif_dir).await?;
        info!(gif_dir = ?self.gif_dir, index = ?self.store.path(), "Cache initialized");
        Ok(())
    }

    /// Number of live entries, for health reporting.
    pub async fn entry_count(&self) -> usize {
        let _guard = self.lock.lock().await;
        self.store.load().await.len()
    }

    /// Return the artifact for `requested`, generating it on a miss.
    ///
    /// Expired entries are swept (and their files deleted) first. A hit
    /// within the 90 second tolerance returns the existing artifact as-is;
    /// its expiry is never extended. On a miss the renderer runs under a
    /// timeout, and the new entry is only inserted and persisted after the
    /// render succeeds.
    pub async fn get_or_generate(&self, requested: i64) -> Result<PathBuf> {
        let _guard = self.lock.lock().await;

        let mut index = self.store.load().await;
        self.sweep(&mut index, Utc::now().timestamp()).await?;

        if let Some(path) = find_cached(&index, requested) {
            info!(requested, path = ?path, "Serving cached GIF");
            return Ok(path);
        }

        let bucket = bucket_key(requested);
        // Stable name per bucket: a repeat miss overwrites instead of
        // accumulating files.
        let path = self.gif_dir.join(format!("countdown_{}.gif", bucket));

        match tokio::time::timeout(self.render_timeout, self.renderer.render(requested, &path))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CacheError::Generation(format!(
                    "render timed out after {}s",
                    self.render_timeout.as_secs()
                )));
            }
        }

        index.insert(
            bucket,
            CacheEntry {
                file_path: path.clone(),
                expires_at: requested,
            },
        );
        self.store.save(&index).await?;

        info!(bucket, path = ?path, "New GIF generated and cached");
        Ok(path)
    }

    /// Drop entries whose target has passed and best-effort delete their
    /// files. Always persists, so a corrupt store recovered on load gets
    /// rewritten even when nothing was evicted.
    async fn sweep(&self, index: &mut CacheIndex, now: i64) -> Result<()> {
        let expired: Vec<i64> = index
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            if let Some(entry) = index.remove(&key) {
                match fs::remove_file(&entry.file_path).await {
                    Ok(()) => debug!(path = ?entry.file_path, "Deleted expired GIF"),
                    Err(e) => {
                        warn!(path = ?entry.file_path, error = %e, "Failed to delete expired GIF")
                    }
                }
            }
        }

        self.store.save(index).await
    }
}

/// Find the entry whose bucket key is within tolerance of `requested`,
/// preferring the closest bucket when several qualify.
fn find_cached(index: &CacheIndex, requested: i64) -> Option<PathBuf> {
    index
        .iter()
        .filter(|(key, _)| (**key - requested).abs() <= MATCH_TOLERANCE_SECS)
        .min_by_key(|(key, _)| (**key - requested).abs())
        .map(|(_, entry)| entry.file_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct CountingRenderer {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn render(&self, _target: i64, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::Generation("renderer exploded".to_string()));
            }
            fs::write(output, b"GIF89a test frames").await?;
            Ok(())
        }
    }

    struct SlowRenderer;

    #[async_trait]
    impl Renderer for SlowRenderer {
        async fn render(&self, _target: i64, output: &Path) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            fs::write(output, b"GIF89a").await?;
            Ok(())
        }
    }

    fn entry(path: &str, expires_at: i64) -> CacheEntry {
        CacheEntry {
            file_path: PathBuf::from(path),
            expires_at,
        }
    }

    fn test_cache(
        dir: &Path,
        fail: bool,
    ) -> (CountdownCache<CountingRenderer>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = CountingRenderer {
            calls: calls.clone(),
            fail,
        };
        let cache = CountdownCache::new(
            IndexStore::new(dir.join("cache.json")),
            dir.join("gifs"),
            renderer,
            Duration::from_secs(30),
        );
        (cache, calls)
    }

    #[tokio::test]
    async fn test_miss_generates_and_registers_entry() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();

        let requested = Utc::now().timestamp() + 3600 + 17;
        let path = cache.get_or_generate(requested).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(path.exists());

        let index = IndexStore::new(dir.path().join("cache.json")).load().await;
        assert_eq!(index.len(), 1);
        let bucket = bucket_key(requested);
        let entry = index.get(&bucket).unwrap();
        assert_eq!(entry.expires_at, requested);
        assert_eq!(entry.file_path, path);
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .contains(&bucket.to_string()));
    }

    #[tokio::test]
    async fn test_hit_within_tolerance_skips_renderer() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();

        let requested = Utc::now().timestamp() + 3600;
        let first = cache.get_or_generate(requested).await.unwrap();

        // 60 seconds later, inside the 90 second tolerance.
        let second = cache.get_or_generate(requested + 60).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let index = IndexStore::new(dir.path().join("cache.json")).load().await;
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_request_outside_tolerance_regenerates() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();

        let requested = Utc::now().timestamp() + 3600;
        let first = cache.get_or_generate(requested).await.unwrap();
        let second = cache.get_or_generate(requested + 300).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entry_and_file() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();

        // Seed an entry whose countdown finished an hour ago.
        let stale_bucket = bucket_key(Utc::now().timestamp() - 3600);
        let stale_path = dir.path().join("gifs").join("countdown_stale.gif");
        std::fs::write(&stale_path, b"GIF89a old").unwrap();

        let store = IndexStore::new(dir.path().join("cache.json"));
        let mut index = CacheIndex::new();
        index.insert(
            stale_bucket,
            entry(stale_path.to_str().unwrap(), stale_bucket),
        );
        store.save(&index).await.unwrap();

        // A nearby request is a miss now: the stale entry is gone.
        let path = cache.get_or_generate(stale_bucket + 30).await.unwrap();

        assert!(!stale_path.exists());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(path.exists());

        let index = store.load().await;
        assert_eq!(index.len(), 1);
        assert!(!index.contains_key(&stale_bucket) || index[&stale_bucket].file_path == path);
    }

    #[tokio::test]
    async fn test_renderer_failure_leaves_no_entry() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), true);
        cache.init().await.unwrap();

        let requested = Utc::now().timestamp() + 3600;
        let err = cache.get_or_generate(requested).await.unwrap_err();

        assert!(matches!(err, CacheError::Generation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let index = IndexStore::new(dir.path().join("cache.json")).load().await;
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_render_timeout_is_generation_error() {
        let dir = tempdir().unwrap();
        let cache = CountdownCache::new(
            IndexStore::new(dir.path().join("cache.json")),
            dir.path().join("gifs"),
            SlowRenderer,
            Duration::from_millis(20),
        );
        cache.init().await.unwrap();

        let requested = Utc::now().timestamp() + 3600;
        let err = cache.get_or_generate(requested).await.unwrap_err();
        assert!(matches!(err, CacheError::Generation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_same_bucket_renders_once() {
        let dir = tempdir().unwrap();
        let (cache, calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();
        let cache = Arc::new(cache);

        let requested = Utc::now().timestamp() + 3600;
        let a = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_generate(requested).await })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_generate(requested + 10).await })
        };

        let path_a = a.await.unwrap().unwrap();
        let path_b = b.await.unwrap().unwrap();

        assert_eq!(path_a, path_b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_count_reflects_store() {
        let dir = tempdir().unwrap();
        let (cache, _calls) = test_cache(dir.path(), false);
        cache.init().await.unwrap();

        assert_eq!(cache.entry_count().await, 0);
        cache
            .get_or_generate(Utc::now().timestamp() + 3600)
            .await
            .unwrap();
        assert_eq!(cache.entry_count().await, 1);
    }

    #[test]
    fn test_find_cached_prefers_closest_bucket() {
        let mut index = CacheIndex::new();
        index.insert(1700000100, entry("gifs/a.gif", 1700000150));
        index.insert(1700000220, entry("gifs/b.gif", 1700000250));

        // Both buckets are within 90s of 1700000150; 1700000100 is closer.
        let found = find_cached(&index, 1700000150).unwrap();
        assert_eq!(found, PathBuf::from("gifs/a.gif"));
    }

    #[test]
    fn test_find_cached_none_outside_tolerance() {
        let mut index = CacheIndex::new();
        index.insert(1700000100, entry("gifs/a.gif", 1700000150));

        assert!(find_cached(&index, 1700000100 + 91).is_none());
        assert!(find_cached(&index, 1700000100 - 91).is_none());
        assert!(find_cached(&index, 1700000100 + 90).is_some());
    }
}
