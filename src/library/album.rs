//! Filesystem-backed album store.
//!
//! There is no metadata index: every call stats the filesystem, so an asset
//! deleted concurrently simply surfaces as [`LibraryError::NotFound`].
//!
//! # Layout
//!
//! ```text
//! root/
//! └── {album}/
//!     ├── {file}                  assets
//!     ├── .thumbs/{file}.jpg      cached thumbnails
//!     ├── .{album}.zip.partial    archive being built (hidden)
//!     └── {album}.zip             finished archive awaiting download
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use crate::error::LibraryError;
use crate::media::{classify, MediaKind};

use super::names::{safe_album, validate_filename};

/// Hidden per-album thumbnail directory.
pub const THUMB_DIR: &str = ".thumbs";

// =============================================================================
// AlbumName
// =============================================================================

/// A sanitised album name, safe to join onto the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumName(String);

impl AlbumName {
    /// Sanitise `raw` into an album name.
    pub fn parse(raw: &str) -> Result<Self, LibraryError> {
        safe_album(raw).map(AlbumName)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this album's finished archive.
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl std::fmt::Display for AlbumName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Asset
// =============================================================================

/// A stored asset, as observed at the time of the call.
#[derive(Debug, Clone)]
pub struct Asset {
    pub album: AlbumName,
    pub filename: String,
    pub path: PathBuf,
    pub len: u64,
    pub modified: SystemTime,
    pub kind: MediaKind,
}

impl Asset {
    /// Modification time as whole seconds since the epoch.
    pub fn modified_secs(&self) -> u64 {
        unix_secs(self.modified)
    }

    /// SHA-256 of the current content.
    pub async fn digest(&self) -> Result<String, crate::error::DigestError> {
        crate::media::digest(self.path.clone()).await
    }
}

/// JSON view of an asset for album listings.
#[derive(Debug, Clone, Serialize)]
pub struct AssetEntry {
    pub name: String,
    pub kind: MediaKind,
    pub size: u64,
    pub modified: u64,
}

impl From<&Asset> for AssetEntry {
    fn from(asset: &Asset) -> Self {
        Self {
            name: asset.filename.clone(),
            kind: asset.kind,
            size: asset.len,
            modified: asset.modified_secs(),
        }
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// AlbumStore
// =============================================================================

/// Resolves albums and assets under a single root directory.
///
/// Cheap to clone; all clones share the same root.
#[derive(Debug, Clone)]
pub struct AlbumStore {
    root: Arc<PathBuf>,
}

impl AlbumStore {
    /// Create a store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> Result<(), LibraryError> {
        tokio::fs::create_dir_all(self.root.as_path())
            .await
            .map_err(|e| LibraryError::from_io(e, self.root.display()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn album_dir(&self, album: &AlbumName) -> PathBuf {
        self.root.join(album.as_str())
    }

    pub fn thumbs_dir(&self, album: &AlbumName) -> PathBuf {
        self.album_dir(album).join(THUMB_DIR)
    }

    /// Deterministic thumbnail cache path for an asset.
    pub fn thumb_path(&self, album: &AlbumName, filename: &str) -> PathBuf {
        self.thumbs_dir(album).join(format!("{}.jpg", filename))
    }

    /// Path of the album's finished archive.
    pub fn archive_path(&self, album: &AlbumName) -> PathBuf {
        self.album_dir(album).join(album.archive_file_name())
    }

    /// Hidden path the archive is written to before it is renamed into place.
    pub fn partial_archive_path(&self, album: &AlbumName) -> PathBuf {
        self.album_dir(album)
            .join(format!(".{}.partial", album.archive_file_name()))
    }

    /// Create the album directory if needed and return its path.
    pub async fn create_album(&self, album: &AlbumName) -> Result<PathBuf, LibraryError> {
        let dir = self.album_dir(album);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| LibraryError::from_io(e, album))?;
        Ok(dir)
    }

    /// Whether the album directory exists.
    pub async fn album_exists(&self, album: &AlbumName) -> bool {
        tokio::fs::metadata(self.album_dir(album))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Names of all albums, sorted.
    pub async fn list_albums(&self) -> Result<Vec<String>, LibraryError> {
        let mut entries = match tokio::fs::read_dir(self.root.as_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LibraryError::from_io(e, self.root.display())),
        };

        let mut albums = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LibraryError::from_io(e, self.root.display()))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                albums.push(name);
            }
        }

        albums.sort();
        Ok(albums)
    }

    /// All assets in an album, newest first.
    pub async fn list_assets(&self, album: &AlbumName) -> Result<Vec<Asset>, LibraryError> {
        let dir = self.album_dir(album);
        let archive = album.archive_file_name();

        let names = tokio::task::spawn_blocking(move || album_files(&dir, &archive))
            .await
            .map_err(|e| LibraryError::Io(e.to_string()))?
            .map_err(|e| LibraryError::from_io(e, album))?;

        let mut assets = Vec::with_capacity(names.len());
        for (name, _) in names {
            match self.asset(album, &name).await {
                Ok(asset) => assets.push(asset),
                // Vanished or not an asset type: skip it
                Err(e) => debug!(album = %album, file = %name, "Skipping entry: {}", e),
            }
        }

        assets.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(assets)
    }

    /// Stat and classify a single asset.
    pub async fn asset(&self, album: &AlbumName, filename: &str) -> Result<Asset, LibraryError> {
        validate_filename(filename)?;

        let kind = classify(filename);
        if !kind.is_allowed() {
            return Err(LibraryError::Unsupported {
                filename: filename.to_string(),
            });
        }

        let path = self.album_dir(album).join(filename);
        let what = format!("{}/{}", album, filename);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| LibraryError::from_io(e, &what))?;

        if !meta.is_file() {
            return Err(LibraryError::NotFound(what));
        }

        let modified = meta
            .modified()
            .map_err(|e| LibraryError::from_io(e, &what))?;

        Ok(Asset {
            album: album.clone(),
            filename: filename.to_string(),
            path,
            len: meta.len(),
            modified,
            kind,
        })
    }

    /// Delete an asset and its cached thumbnail.
    ///
    /// Returns `false` if the asset was already gone.
    pub async fn delete_asset(
        &self,
        album: &AlbumName,
        filename: &str,
    ) -> Result<bool, LibraryError> {
        validate_filename(filename)?;

        let removed = remove_if_exists(&self.album_dir(album).join(filename))
            .await
            .map_err(|e| LibraryError::from_io(e, format!("{}/{}", album, filename)))?;

        if let Err(e) = remove_if_exists(&self.thumb_path(album, filename)).await {
            debug!(album = %album, file = %filename, "Thumbnail removal failed: {}", e);
        }

        Ok(removed)
    }

    /// Remove everything in an album, thumbnails and archives included,
    /// leaving an empty directory behind.
    pub async fn clear_album(&self, album: &AlbumName) -> Result<(), LibraryError> {
        let dir = self.album_dir(album);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LibraryError::from_io(e, album)),
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| LibraryError::from_io(e, album))
    }
}

/// Regular, non-hidden files of an album directory in listing order,
/// excluding the album's own archive (blocking).
pub fn album_files(dir: &Path, archive_name: &str) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || name == archive_name {
            continue;
        }
        let path = entry.path();
        if std::fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            files.push((name, path));
        }
    }
    Ok(files)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
