//! Album archives: building with progress, one-shot download, and sweeping.

mod builder;
mod download;
mod sweep;

pub use builder::{ArchiveBuild, ArchiveService, ProgressEvent, DEFAULT_PROGRESS_BUFFER};
pub use download::{ArchiveDownload, ArchiveStream, DeleteOnDrop};
pub use sweep::{DEFAULT_ARCHIVE_TTL, DEFAULT_SWEEP_INTERVAL};
