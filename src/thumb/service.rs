//! Thumbnail Service for orchestrating derivation.
//!
//! The ThumbnailService is the entry point for thumbnail and preview
//! requests. It orchestrates:
//! - Capability lookup in the decoder table
//! - Memory and disk cache lookups
//! - Single-flight generation per asset
//! - Decoding, resizing and JPEG encoding
//! - Atomic persistence of the result
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ThumbnailService                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                        derive()                            │  │
//! │  │  1. Pick strategy     4. Check .thumbs (mtime match)       │  │
//! │  │  2. Check memory      5. Decode + encode                   │  │
//! │  │  3. Lock asset key    6. Persist atomically & cache        │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │         │                    │                      │            │
//! │         ▼                    ▼                      ▼            │
//! │  ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐    │
//! │  │ThumbnailCache│   │  DecoderTable  │   │ ThumbnailEncoder │    │
//! │  └──────────────┘   └────────────────┘   └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures never propagate out of [`ThumbnailService::derive`]: they
//! become [`Thumbnail::Unavailable`] and the caller serves a placeholder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::ThumbnailError;
use crate::library::{AlbumName, AlbumStore, Asset};
use crate::media::MediaKind;

use super::cache::{ThumbCacheKey, ThumbnailCache, DEFAULT_THUMB_MEMORY_CAPACITY};
use super::decode::DecoderTable;
use super::encoder::ThumbnailEncoder;
use super::store;

/// 1x1 transparent GIF served when no thumbnail can be produced.
pub const PLACEHOLDER_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

// =============================================================================
// Thumbnail
// =============================================================================

/// Outcome of a derivation request.
#[derive(Debug, Clone)]
pub enum Thumbnail {
    /// Encoded JPEG, and whether it came from a cache
    Ready { data: Bytes, cache_hit: bool },

    /// No thumbnail could be produced; serve the placeholder
    Unavailable { reason: ThumbnailError },
}

impl Thumbnail {
    pub fn is_ready(&self) -> bool {
        matches!(self, Thumbnail::Ready { .. })
    }

    pub fn cache_hit(&self) -> bool {
        matches!(self, Thumbnail::Ready { cache_hit: true, .. })
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Thumbnail::Ready { .. } => "image/jpeg",
            Thumbnail::Unavailable { .. } => "image/gif",
        }
    }

    /// Bytes to send: the JPEG, or the placeholder GIF.
    pub fn body(&self) -> Bytes {
        match self {
            Thumbnail::Ready { data, .. } => data.clone(),
            Thumbnail::Unavailable { .. } => Bytes::from_static(PLACEHOLDER_GIF),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of derivation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThumbnailStats {
    /// Thumbnails decoded and encoded from source
    pub generated: u64,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub unavailable: u64,
}

#[derive(Debug, Default)]
struct Counters {
    generated: AtomicU64,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    unavailable: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ThumbnailStats {
        ThumbnailStats {
            generated: self.generated.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Per-key generation locks
// =============================================================================

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Single-flight locks keyed by `album/file`.
///
/// Entries are dropped once the last holder or waiter is gone.
#[derive(Default)]
struct KeyLocks {
    locks: Arc<LockMap>,
}

struct KeyGuard {
    key: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    async fn acquire(&self, key: String) -> KeyGuard {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map's own reference left: nobody holds or waits
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

// =============================================================================
// Thumbnail Service
// =============================================================================

/// Service for deriving and caching thumbnails.
///
/// Shared across requests and ingest workers via `Arc`.
pub struct ThumbnailService {
    store: AlbumStore,
    table: DecoderTable,
    encoder: ThumbnailEncoder,
    cache: ThumbnailCache,
    locks: KeyLocks,
    counters: Counters,
}

impl ThumbnailService {
    /// Create a service with the default memory cache capacity (32MB).
    pub fn new(store: AlbumStore, table: DecoderTable, encoder: ThumbnailEncoder) -> Self {
        Self::with_cache_capacity(store, table, encoder, DEFAULT_THUMB_MEMORY_CAPACITY)
    }

    /// Create a service with a custom memory cache capacity in bytes.
    pub fn with_cache_capacity(
        store: AlbumStore,
        table: DecoderTable,
        encoder: ThumbnailEncoder,
        cache_capacity: usize,
    ) -> Self {
        Self {
            store,
            table,
            encoder,
            cache: ThumbnailCache::with_capacity(cache_capacity),
            locks: KeyLocks::default(),
            counters: Counters::default(),
        }
    }

    /// Get a thumbnail, using the caches when they are still valid.
    ///
    /// Never fails: any error is reported as [`Thumbnail::Unavailable`].
    pub async fn derive(&self, asset: &Asset) -> Thumbnail {
        match self.try_derive(asset).await {
            Ok((data, cache_hit)) => Thumbnail::Ready { data, cache_hit },
            Err(reason) => {
                self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
                match &reason {
                    ThumbnailError::Io(_) => {
                        warn!(album = %asset.album, file = %asset.filename, "Thumbnail unavailable: {}", reason)
                    }
                    _ => {
                        debug!(album = %asset.album, file = %asset.filename, "Thumbnail unavailable: {}", reason)
                    }
                }
                Thumbnail::Unavailable { reason }
            }
        }
    }

    async fn try_derive(&self, asset: &Asset) -> Result<(Bytes, bool), ThumbnailError> {
        let source = self.table.for_kind(asset.kind)?;
        let key = ThumbCacheKey::for_asset(asset);

        if let Some(data) = self.cache.get(&key).await {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok((data, true));
        }

        let _guard = self
            .locks
            .acquire(format!("{}/{}", asset.album, asset.filename))
            .await;

        // Another request may have finished while we waited
        if let Some(data) = self.cache.get(&key).await {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok((data, true));
        }

        let thumb_path = self.store.thumb_path(&asset.album, &asset.filename);
        if let Some(data) = store::load_if_fresh(&thumb_path, asset.modified).await {
            self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
            self.cache.put(key, data.clone()).await;
            return Ok((data, true));
        }

        let img = source.decode(&asset.path).await?;
        let encoder = self.encoder;
        let data = tokio::task::spawn_blocking(move || encoder.encode(img))
            .await
            .map_err(|e| ThumbnailError::Encode {
                message: format!("encoder task failed: {}", e),
            })??;

        // A failed write only costs a regeneration later
        if let Err(e) = store::persist(&thumb_path, &data, asset.modified).await {
            warn!(album = %asset.album, file = %asset.filename, "Failed to persist thumbnail: {}", e);
        }

        self.counters.generated.fetch_add(1, Ordering::Relaxed);
        debug!(
            album = %asset.album,
            file = %asset.filename,
            decoder = source.name(),
            bytes = data.len(),
            "Generated thumbnail"
        );

        self.cache.put(key, data.clone()).await;
        Ok((data, false))
    }

    /// Full-size JPEG rendition for RAW assets; `None` for other kinds.
    ///
    /// Previews are not cached.
    pub async fn preview(&self, asset: &Asset) -> Result<Option<Bytes>, ThumbnailError> {
        if asset.kind != MediaKind::Raw {
            return Ok(None);
        }

        let source = self.table.for_kind(MediaKind::Raw)?;
        let img = source.decode_full(&asset.path).await?;
        let encoder = self.encoder;
        let data = tokio::task::spawn_blocking(move || encoder.encode_full(&img))
            .await
            .map_err(|e| ThumbnailError::Encode {
                message: format!("encoder task failed: {}", e),
            })??;

        Ok(Some(data))
    }

    /// Drop cached thumbnails of one asset, in memory and on disk.
    pub async fn invalidate(&self, album: &AlbumName, filename: &str) {
        self.cache.remove_asset(album.as_str(), filename).await;
        let path = self.store.thumb_path(album, filename);
        if let Err(e) = store::remove(&path).await {
            warn!(album = %album, file = %filename, "Failed to remove thumbnail: {}", e);
        }
    }

    /// Drop every in-memory thumbnail of an album.
    ///
    /// The `.thumbs` directory goes away with the album itself.
    pub async fn invalidate_album(&self, album: &AlbumName) {
        self.cache.remove_album(album.as_str()).await;
    }

    pub fn stats(&self) -> ThumbnailStats {
        self.counters.snapshot()
    }

    /// Get memory cache statistics.
    ///
    /// Returns `(current_size, capacity, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        (
            self.cache.size().await,
            self.cache.capacity(),
            self.cache.len().await,
        )
    }

    pub fn decoders(&self) -> &DecoderTable {
        &self.table
    }

    pub fn encoder(&self) -> &ThumbnailEncoder {
        &self.encoder
    }
}
