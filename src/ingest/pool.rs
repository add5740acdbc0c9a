//! Bounded worker pool for post-upload processing.
//!
//! Each stored upload is moved into place, its thumbnail is invalidated and
//! re-derived, and its digest is logged. At most `workers` uploads are
//! processed at once; a request waits for all of its own uploads.
//!
//! The pool is owned by the application state and drained on shutdown:
//! [`IngestPool::shutdown`] stops accepting work and waits for in-flight
//! tasks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::File;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::library::{AlbumName, AlbumStore};
use crate::media::is_allowed;
use crate::thumb::ThumbnailService;

/// Default number of concurrent ingest workers.
pub const DEFAULT_INGEST_WORKERS: usize = 4;

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

// =============================================================================
// Staged uploads
// =============================================================================

/// An upload written to a hidden temporary file inside its album.
///
/// The temporary name starts with `.` so listings and archives never see a
/// half-received file.
#[derive(Debug)]
pub struct StagedUpload {
    name: String,
    staged: PathBuf,
}

impl StagedUpload {
    /// Create the staging file for `name` in `album_dir`.
    ///
    /// `name` must already be sanitised.
    pub async fn create(album_dir: &Path, name: &str) -> std::io::Result<(Self, File)> {
        let n = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let staged = album_dir.join(format!(".{}.{}.upload", name, n));
        let file = File::create(&staged).await?;
        Ok((
            Self {
                name: name.to_string(),
                staged,
            },
            file,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    /// Remove the staging file.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.staged).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.staged.display(), "Failed to remove staged upload: {}", e);
            }
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// An upload that was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub name: String,
    /// `None` if the digest could not be computed
    pub sha256: Option<String>,
    /// Whether a thumbnail is available
    pub thumbnail: bool,
}

/// An upload that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of one upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub stored: Vec<StoredAsset>,
    /// Names refused because of their type
    pub rejected: Vec<String>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty() && self.rejected.is_empty() && self.failed.is_empty()
    }
}

// =============================================================================
// IngestPool
// =============================================================================

/// Fan-out/fan-in worker pool for stored uploads.
pub struct IngestPool {
    store: AlbumStore,
    thumbs: Arc<ThumbnailService>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    workers: usize,
}

impl IngestPool {
    pub fn new(store: AlbumStore, thumbs: Arc<ThumbnailService>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            store,
            thumbs,
            permits: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of tasks not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Process `uploads` for `album` and wait for every one of them.
    pub async fn ingest(&self, album: &AlbumName, uploads: Vec<StagedUpload>) -> IngestReport {
        let mut report = IngestReport::default();

        if self.tracker.is_closed() {
            for upload in uploads {
                report.failed.push(IngestFailure {
                    name: upload.name.clone(),
                    reason: "server is shutting down".to_string(),
                });
                upload.discard().await;
            }
            return report;
        }

        let mut handles = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if !is_allowed(&upload.name) {
                report.rejected.push(upload.name.clone());
                upload.discard().await;
                continue;
            }

            let name = upload.name.clone();
            let task = IngestTask {
                album: album.clone(),
                upload,
                store: self.store.clone(),
                thumbs: self.thumbs.clone(),
            };
            let permits = self.permits.clone();
            let handle = self.tracker.spawn(async move {
                match permits.acquire_owned().await {
                    Ok(_permit) => task.run().await,
                    Err(_) => {
                        let name = task.upload.name.clone();
                        task.upload.discard().await;
                        Err(IngestFailure {
                            name,
                            reason: "ingest pool closed".to_string(),
                        })
                    }
                }
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(stored)) => report.stored.push(stored),
                Ok(Err(failure)) => report.failed.push(failure),
                Err(e) => {
                    warn!(album = %album, file = %name, "Ingest task failed: {}", e);
                    report.failed.push(IngestFailure {
                        name,
                        reason: "worker task failed".to_string(),
                    });
                }
            }
        }

        info!(
            album = %album,
            stored = report.stored.len(),
            rejected = report.rejected.len(),
            failed = report.failed.len(),
            "Upload processed"
        );
        report
    }

    /// Stop accepting uploads and wait for in-flight tasks.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Draining ingest pool");
        }
        self.tracker.wait().await;
        debug!("Ingest pool drained");
    }
}

struct IngestTask {
    album: AlbumName,
    upload: StagedUpload,
    store: AlbumStore,
    thumbs: Arc<ThumbnailService>,
}

impl IngestTask {
    async fn run(self) -> Result<StoredAsset, IngestFailure> {
        let name = self.upload.name.clone();
        let target = self.store.album_dir(&self.album).join(&name);

        if let Err(e) = tokio::fs::rename(self.upload.staged_path(), &target).await {
            warn!(album = %self.album, file = %name, "Failed to store upload: {}", e);
            self.upload.discard().await;
            return Err(IngestFailure {
                name,
                reason: e.to_string(),
            });
        }

        // A replaced file must not keep its predecessor's thumbnail
        self.thumbs.invalidate(&self.album, &name).await;

        let asset = self
            .store
            .asset(&self.album, &name)
            .await
            .map_err(|e| IngestFailure {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let thumbnail = self.thumbs.derive(&asset).await.is_ready();

        let sha256 = match asset.digest().await {
            Ok(hex) => {
                info!(
                    album = %self.album,
                    file = %name,
                    size = asset.len,
                    kind = %asset.kind,
                    sha256 = %hex,
                    "Stored asset"
                );
                Some(hex)
            }
            Err(e) => {
                warn!(album = %self.album, file = %name, "{}", e);
                None
            }
        };

        Ok(StoredAsset {
            name,
            sha256,
            thumbnail,
        })
    }
}
