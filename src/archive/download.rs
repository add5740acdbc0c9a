//! One-shot archive download.
//!
//! A finished archive is handed out at most once: the returned stream owns a
//! guard that deletes the file when the stream is dropped, whether the body
//! was sent in full or the client went away half way.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::ArchiveError;
use crate::library::AlbumName;

use super::builder::ArchiveService;

/// Removes a file when dropped.
#[derive(Debug)]
pub struct DeleteOnDrop {
    path: PathBuf,
}

impl DeleteOnDrop {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeleteOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed delivered archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove archive: {}", e),
        }
    }
}

/// Body stream of an archive download; deletes the archive when dropped.
pub struct ArchiveStream {
    // Declared first so the file is closed before the guard deletes it
    inner: ReaderStream<File>,
    _guard: DeleteOnDrop,
}

impl Stream for ArchiveStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// An archive ready to be sent as an attachment.
pub struct ArchiveDownload {
    pub file_name: String,
    pub len: u64,
    pub stream: ArchiveStream,
}

impl ArchiveService {
    /// Path of the album's finished archive, if one is waiting.
    pub async fn archive_exists(&self, album: &AlbumName) -> Option<PathBuf> {
        let path = self.store.archive_path(album);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Open the finished archive for a single download.
    ///
    /// Never starts a build; returns [`ArchiveError::NotFound`] if there is
    /// nothing to deliver.
    pub async fn open_download(&self, album: &AlbumName) -> Result<ArchiveDownload, ArchiveError> {
        let not_found = || ArchiveError::NotFound(album.to_string());
        let path = self.archive_exists(album).await.ok_or_else(not_found)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            // Taken by a concurrent download
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ArchiveError::Io(format!("{}: {}", album, e))),
        };
        let len = file
            .metadata()
            .await
            .map_err(|e| ArchiveError::Io(format!("{}: {}", album, e)))?
            .len();

        Ok(ArchiveDownload {
            file_name: album.archive_file_name(),
            len,
            stream: ArchiveStream {
                inner: ReaderStream::with_capacity(file, self.chunk_size),
                _guard: DeleteOnDrop::new(path),
            },
        })
    }
}
