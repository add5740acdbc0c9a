//! On-disk thumbnail cache.
//!
//! A cached file carries the mtime of the source it was derived from and is
//! valid only while the source's mtime is exactly that value. Writes go to a
//! unique temporary sibling and are renamed over the target, so readers (in
//! this or another process) see either the old file or the complete new one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::ThumbnailError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Read `path` if it was derived from a source modified at `source_modified`.
///
/// Any error (missing file, unreadable metadata) is a miss.
pub async fn load_if_fresh(path: &Path, source_modified: SystemTime) -> Option<Bytes> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let cached_modified = meta.modified().ok()?;
    if !meta.is_file() || cached_modified != source_modified {
        return None;
    }
    tokio::fs::read(path).await.ok().map(Bytes::from)
}

/// Atomically write `data` to `path`, creating the parent directory.
///
/// The file's mtime is set to `source_modified` before it becomes visible.
pub async fn persist(
    path: &Path,
    data: &[u8],
    source_modified: SystemTime,
) -> Result<(), ThumbnailError> {
    let io_err = |e: std::io::Error| ThumbnailError::Io(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp = temp_path(path);
    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || {
            file.set_modified(source_modified)?;
            file.sync_all()
        })
        .await
        .map_err(std::io::Error::other)??;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}

/// Remove a cached thumbnail; a missing file is not an error.
pub async fn remove(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}.tmp", std::process::id(), n));
    path.with_file_name(name)
}
