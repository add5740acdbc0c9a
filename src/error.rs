use thiserror::Error;

/// Errors from album and asset resolution on the local filesystem
#[derive(Debug, Clone, Error)]
pub enum LibraryError {
    /// Album name is empty after sanitisation
    #[error("Invalid album name: {0:?}")]
    InvalidAlbumName(String),

    /// File name is empty, hidden, or a path traversal component
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    /// Album or asset does not exist (or vanished during the request)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Extension is not in the allow-list (should map to HTTP 415)
    #[error("Unsupported file type: {filename}")]
    Unsupported { filename: String },

    /// Any other filesystem error
    #[error("I/O error: {0}")]
    Io(String),
}

impl LibraryError {
    /// Map a `std::io::Error` for `what`, folding `NotFound` into the typed variant.
    pub fn from_io(err: std::io::Error, what: impl std::fmt::Display) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LibraryError::NotFound(what.to_string())
        } else {
            LibraryError::Io(format!("{}: {}", what, err))
        }
    }
}

/// Errors from `Range` header resolution (HTTP 416)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Header is not a single `bytes=<start>-<end>` range
    #[error("Malformed range header: {0:?}")]
    Malformed(String),

    /// Range does not overlap the resource
    #[error("Range not satisfiable: start {start}, end {end:?}, resource length {total}")]
    NotSatisfiable {
        start: u64,
        end: Option<u64>,
        total: u64,
    },
}

impl RangeError {
    /// Length of the resource the range was resolved against, when known.
    pub fn total(&self) -> Option<u64> {
        match self {
            RangeError::Malformed(_) => None,
            RangeError::NotSatisfiable { total, .. } => Some(*total),
        }
    }
}

/// Errors raised while deriving a thumbnail or preview.
///
/// These never reach the client as failures: the thumbnail endpoint degrades
/// to a placeholder image.
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// Asset kind has no derivation strategy
    #[error("No thumbnail strategy for {0}")]
    Unsupported(String),

    /// Decoder for this kind is not available on this host
    #[error("Decoder capability missing: {0}")]
    CapabilityMissing(&'static str),

    /// Source could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Derivative could not be encoded
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Cache or source I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from album archive building and delivery
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// Album or finished archive does not exist
    #[error("Archive not found for album {0}")]
    NotFound(String),

    /// Another build for the same album is in progress
    #[error("An archive build is already running for album {0}")]
    Busy(String),

    /// Failure while writing the archive
    #[error("Archive I/O error: {0}")]
    Io(String),
}

/// Error computing a content digest
#[derive(Debug, Clone, Error)]
#[error("Integrity digest failed for {path}: {message}")]
pub struct DigestError {
    pub path: String,
    pub message: String,
}
