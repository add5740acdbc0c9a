//! Content classification by file extension.
//!
//! Upload validation, streaming and thumbnail derivation all ask this module
//! what a file is, so there is exactly one definition of a supported asset.
//!
//! The three extension sets are disjoint. Anything outside their union is
//! [`MediaKind::Rejected`].

use serde::Serialize;

/// Still image extensions (lower-case, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Video container extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "avi", "mov", "mkv"];

/// Camera RAW extensions.
pub const RAW_EXTENSIONS: &[&str] = &["dng", "raw", "nef", "cr2", "arw", "rw2"];

/// Fallback MIME type for anything without a known mapping.
pub const OCTET_STREAM: &str = "application/octet-stream";

// =============================================================================
// MediaKind
// =============================================================================

/// Classification of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Raw,
    Rejected,
}

impl MediaKind {
    /// Get a short lowercase name for logs and JSON.
    pub const fn name(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Raw => "raw",
            MediaKind::Rejected => "rejected",
        }
    }

    /// Whether this kind is an accepted asset type.
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, MediaKind::Rejected)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Lower-cased extension of `filename`, if it has one.
///
/// A leading dot alone (`.hidden`) is not an extension.
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify a file name by its extension.
pub fn classify(filename: &str) -> MediaKind {
    let Some(ext) = extension(filename) else {
        return MediaKind::Rejected;
    };
    let ext = ext.as_str();

    if IMAGE_EXTENSIONS.contains(&ext) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        MediaKind::Video
    } else if RAW_EXTENSIONS.contains(&ext) {
        MediaKind::Raw
    } else {
        MediaKind::Rejected
    }
}

/// Whether `filename` is an allowed asset type.
#[inline]
pub fn is_allowed(filename: &str) -> bool {
    classify(filename).is_allowed()
}

/// MIME type to serve `filename` with.
pub fn mime_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg") => "video/ogg",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("dng") => "image/x-adobe-dng",
        Some("nef") => "image/x-nikon-nef",
        Some("cr2") => "image/x-canon-cr2",
        Some("arw") => "image/x-sony-arw",
        Some("rw2") => "image/x-panasonic-rw2",
        Some("zip") => "application/zip",
        _ => OCTET_STREAM,
    }
}
