//! Media typing and integrity.
//!
//! - [`classify`] decides what a file is from its name
//! - [`digest`] computes a streaming SHA-256 of its content

mod classify;
mod digest;

pub use classify::{
    classify, extension, is_allowed, mime_type, MediaKind, IMAGE_EXTENSIONS, OCTET_STREAM,
    RAW_EXTENSIONS, VIDEO_EXTENSIONS,
};
pub use digest::{digest, digest_file, DIGEST_BLOCK_SIZE};
