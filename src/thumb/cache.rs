//! In-memory cache for encoded thumbnails.
//!
//! Sits in front of the on-disk `.thumbs` directory so hot thumbnails are
//! served without touching the filesystem.
//!
//! # Cache Key
//!
//! Entries are keyed by the source asset's identity *and* version:
//! - Album name
//! - File name
//! - Source length in bytes
//! - Source modification time
//!
//! Replacing a file under the same name changes its length or mtime, so a
//! stale entry can never be served; it simply ages out of the LRU.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached thumbnails in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::library::Asset;

/// Default cache capacity: 32MB
pub const DEFAULT_THUMB_MEMORY_CAPACITY: usize = 32 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key identifying one version of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbCacheKey {
    pub album: Arc<str>,
    pub filename: Arc<str>,
    pub len: u64,
    pub modified: SystemTime,
}

impl ThumbCacheKey {
    pub fn new(
        album: impl Into<Arc<str>>,
        filename: impl Into<Arc<str>>,
        len: u64,
        modified: SystemTime,
    ) -> Self {
        Self {
            album: album.into(),
            filename: filename.into(),
            len,
            modified,
        }
    }

    /// Key for the asset as currently observed.
    pub fn for_asset(asset: &Asset) -> Self {
        Self::new(
            asset.album.as_str(),
            asset.filename.as_str(),
            asset.len,
            asset.modified,
        )
    }
}

// =============================================================================
// Thumbnail Cache
// =============================================================================

/// LRU cache for encoded JPEG thumbnails with size-based capacity.
///
/// Thread-safe; share it across tasks via `Arc` or by embedding it in a
/// shared service.
pub struct ThumbnailCache {
    cache: RwLock<LruCache<ThumbCacheKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    current_size: RwLock<usize>,
}

impl ThumbnailCache {
    /// Create a cache with default capacity (32MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_THUMB_MEMORY_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with both a byte and an entry bound.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a thumbnail, marking it recently used.
    pub async fn get(&self, key: &ThumbCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check presence without touching LRU order.
    pub async fn contains(&self, key: &ThumbCacheKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a thumbnail, evicting LRU entries until within capacity.
    pub async fn put(&self, key: ThumbCacheKey, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // Returns either the replaced value or an entry evicted by the entry bound
        if let Some((_, evicted)) = cache.push(key, data) {
            *current_size = current_size.saturating_sub(evicted.len());
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((_, evicted_data)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }
    }

    /// Drop every version of one asset.
    pub async fn remove_asset(&self, album: &str, filename: &str) {
        self.remove_where(|k| &*k.album == album && &*k.filename == filename)
            .await;
    }

    /// Drop every entry belonging to an album.
    pub async fn remove_album(&self, album: &str) {
        self.remove_where(|k| &*k.album == album).await;
    }

    async fn remove_where(&self, pred: impl Fn(&ThumbCacheKey) -> bool) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let doomed: Vec<ThumbCacheKey> = cache
            .iter()
            .filter(|(k, _)| pred(k))
            .map(|(k, _)| k.clone())
            .collect();

        for key in doomed {
            if let Some(data) = cache.pop(&key) {
                *current_size = current_size.saturating_sub(data.len());
            }
        }
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached thumbnails in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new()
    }
}
