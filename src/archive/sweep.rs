//! Removal of archives nobody came back for.
//!
//! Finished archives are normally deleted by their one download. Archives
//! that are never fetched, and partial archives or staged uploads orphaned
//! by a crash, are removed here once they are older than the configured TTL.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ArchiveError;
use crate::library::AlbumName;

use super::builder::ArchiveService;

/// Default age after which an undelivered archive is removed.
pub const DEFAULT_ARCHIVE_TTL: Duration = Duration::from_secs(3600);

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

impl ArchiveService {
    /// Remove archives, partial archives and staged uploads older than `ttl`.
    ///
    /// Albums with a running build are skipped. Returns the number of files
    /// removed.
    pub async fn sweep(&self, ttl: Duration) -> Result<usize, ArchiveError> {
        let albums = self
            .store
            .list_albums()
            .await
            .map_err(|e| ArchiveError::Io(e.to_string()))?;
        let now = SystemTime::now();
        let mut removed = 0;

        for name in albums {
            let Ok(album) = AlbumName::parse(&name) else {
                continue;
            };
            // Directory names that do not survive sanitisation are not albums
            if album.as_str() != name || self.is_building(&album) {
                continue;
            }

            let mut candidates = vec![
                self.store.archive_path(&album),
                self.store.partial_archive_path(&album),
            ];
            candidates.extend(staged_uploads(&self.store.album_dir(&album)).await);

            for path in candidates {
                if remove_if_older(&path, now, ttl).await {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "Swept stale files");
        }
        Ok(removed)
    }

    /// Run [`ArchiveService::sweep`] every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, ttl: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(ttl).await {
                    warn!("Archive sweep failed: {}", e);
                }
            }
        })
    }
}

/// Hidden `.{name}.{n}.upload` files in an album directory.
async fn staged_uploads(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return found;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name.ends_with(".upload") {
            found.push(entry.path());
        }
    }
    found
}

async fn remove_if_older(path: &Path, now: SystemTime, ttl: Duration) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    let age = meta
        .modified()
        .ok()
        .and_then(|m| now.duration_since(m).ok())
        .unwrap_or_default();
    if age < ttl {
        return false;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), age_secs = age.as_secs(), "Removed stale file");
            true
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "Failed to remove stale file: {}", e);
            }
            false
        }
    }
}
