//! Album archive builder.
//!
//! A build snapshots the album's file list, then a blocking writer zips the
//! files into a hidden partial file and renames it into place. Progress is
//! reported as typed events over a bounded channel; the writer blocks on a
//! full channel, so a slow consumer paces the build.
//!
//! # Lifecycle
//!
//! ```text
//! build() ──► snapshot ──► writer (blocking pool)
//!                             │ per entry: Progress ─► channel ─► consumer
//!                             │ done:      rename, Completed
//!                             │ error:     remove partial, Failed
//!                             └ consumer gone: remove partial, stop
//! ```
//!
//! At most one build runs per album. The slot is held by the writer, not
//! the consumer, so it is released only once the partial file is gone or
//! renamed.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::io::DEFAULT_CHUNK_SIZE;
use crate::library::{album_files, AlbumName, AlbumStore};

/// Default number of progress events buffered ahead of the consumer.
pub const DEFAULT_PROGRESS_BUFFER: usize = 4;

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

// =============================================================================
// Progress Events
// =============================================================================

/// Events emitted by a running build, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// One more entry has been written
    Progress {
        completed: usize,
        total: usize,
        fraction: f64,
    },

    /// The archive is in place and ready for download (terminal)
    Completed { path: PathBuf },

    /// The build stopped; no archive was produced (terminal)
    Failed { reason: String },
}

impl ProgressEvent {
    fn progress(completed: usize, total: usize) -> Self {
        ProgressEvent::Progress {
            completed,
            total,
            fraction: completed as f64 / total.max(1) as f64,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }
}

// =============================================================================
// ArchiveBuild
// =============================================================================

/// Consumer side of a running build.
///
/// Dropping it cancels the build: the writer notices on its next event,
/// removes the partial file and releases the album.
pub struct ArchiveBuild {
    album: AlbumName,
    total: usize,
    events: mpsc::Receiver<ProgressEvent>,
}

impl ArchiveBuild {
    pub fn album(&self) -> &AlbumName {
        &self.album
    }

    /// Number of files in the snapshot.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next event, or `None` after the terminal one.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Drain every event (test and CLI helper).
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Consume the build as a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self, |mut build| async move {
            build.next_event().await.map(|event| (event, build))
        })
    }
}

// =============================================================================
// In-flight tracking
// =============================================================================

type InFlight = Arc<Mutex<HashSet<AlbumName>>>;

/// Holds an album's build slot until dropped.
struct BuildSlot {
    album: AlbumName,
    in_flight: InFlight,
}

impl BuildSlot {
    fn claim(in_flight: &InFlight, album: &AlbumName) -> Result<Self, ArchiveError> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(album.clone()) {
            return Err(ArchiveError::Busy(album.to_string()));
        }
        Ok(Self {
            album: album.clone(),
            in_flight: in_flight.clone(),
        })
    }
}

impl Drop for BuildSlot {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.album);
    }
}

// =============================================================================
// ArchiveService
// =============================================================================

/// Builds, hands out and sweeps album archives.
#[derive(Clone)]
pub struct ArchiveService {
    pub(super) store: AlbumStore,
    pub(super) in_flight: InFlight,
    pub(super) chunk_size: usize,
    progress_buffer: usize,
}

impl ArchiveService {
    pub fn new(store: AlbumStore) -> Self {
        Self::with_options(store, DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_BUFFER)
    }

    /// `chunk_size` bounds copy and download buffers; `progress_buffer` is
    /// how far the writer may run ahead of the consumer.
    pub fn with_options(store: AlbumStore, chunk_size: usize, progress_buffer: usize) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            chunk_size: chunk_size.max(1),
            progress_buffer: progress_buffer.max(1),
        }
    }

    /// Whether a build for `album` is currently running.
    pub fn is_building(&self, album: &AlbumName) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(album)
    }

    /// Start building `album`'s archive.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::NotFound`] if the album does not exist
    /// - [`ArchiveError::Busy`] if a build for the album is already running
    /// - [`ArchiveError::Io`] if the album cannot be listed
    pub async fn build(&self, album: &AlbumName) -> Result<ArchiveBuild, ArchiveError> {
        if !self.store.album_exists(album).await {
            return Err(ArchiveError::NotFound(album.to_string()));
        }

        let slot = BuildSlot::claim(&self.in_flight, album)?;

        let dir = self.store.album_dir(album);
        let archive_name = album.archive_file_name();
        let files = tokio::task::spawn_blocking(move || album_files(&dir, &archive_name))
            .await
            .map_err(|e| ArchiveError::Io(e.to_string()))?
            .map_err(|e| ArchiveError::Io(format!("{}: {}", album, e)))?;

        let total = files.len();
        let (tx, rx) = mpsc::channel(self.progress_buffer);
        let job = ArchiveJob {
            album: album.clone(),
            files,
            partial: self.store.partial_archive_path(album),
            target: self.store.archive_path(album),
            chunk_size: self.chunk_size,
        };

        info!(album = %album, files = total, "Starting archive build");

        tokio::task::spawn_blocking(move || {
            let _slot = slot;
            job.run(&tx);
        });

        Ok(ArchiveBuild {
            album: album.clone(),
            total,
            events: rx,
        })
    }
}

// =============================================================================
// Writer
// =============================================================================

struct ArchiveJob {
    album: AlbumName,
    files: Vec<(String, PathBuf)>,
    partial: PathBuf,
    target: PathBuf,
    chunk_size: usize,
}

enum Outcome {
    Completed,
    Abandoned,
}

impl ArchiveJob {
    fn run(self, tx: &mpsc::Sender<ProgressEvent>) {
        match self.write(tx) {
            Ok(Outcome::Completed) => {
                info!(album = %self.album, files = self.files.len(), "Archive ready");
                let _ = tx.blocking_send(ProgressEvent::Completed {
                    path: self.target.clone(),
                });
            }
            Ok(Outcome::Abandoned) => {
                debug!(album = %self.album, "Archive consumer went away, build abandoned");
                self.discard_partial();
            }
            Err(e) => {
                warn!(album = %self.album, "Archive build failed: {}", e);
                self.discard_partial();
                let _ = tx.blocking_send(ProgressEvent::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn write(&self, tx: &mpsc::Sender<ProgressEvent>) -> Result<Outcome, ArchiveError> {
        let io_err = |e: std::io::Error| ArchiveError::Io(format!("{}: {}", self.album, e));
        let zip_err = |e: zip::result::ZipError| ArchiveError::Io(format!("{}: {}", self.album, e));

        let file = File::create(&self.partial).map_err(io_err)?;
        let mut zip = ZipWriter::new(BufWriter::with_capacity(self.chunk_size, file));
        let total = self.files.len();

        for (index, (name, path)) in self.files.iter().enumerate() {
            match File::open(path) {
                Ok(src) => {
                    let len = src.metadata().map(|m| m.len()).unwrap_or_default();
                    let options = SimpleFileOptions::default()
                        .compression_method(CompressionMethod::Deflated)
                        .large_file(len >= ZIP64_THRESHOLD);

                    zip.start_file(name.as_str(), options).map_err(zip_err)?;
                    let mut reader = BufReader::with_capacity(self.chunk_size, src);
                    std::io::copy(&mut reader, &mut zip).map_err(io_err)?;
                }
                // Deleted after the snapshot
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(album = %self.album, file = %name, "File vanished during archive build");
                }
                Err(e) => return Err(io_err(e)),
            }

            if tx.blocking_send(ProgressEvent::progress(index + 1, total)).is_err() {
                return Ok(Outcome::Abandoned);
            }
        }

        let mut writer = zip.finish().map_err(zip_err)?;
        writer.flush().map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        std::fs::rename(&self.partial, &self.target).map_err(io_err)?;
        Ok(Outcome::Completed)
    }

    fn discard_partial(&self) {
        if let Err(e) = std::fs::remove_file(&self.partial) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(album = %self.album, "Failed to remove partial archive: {}", e);
            }
        }
    }
}
