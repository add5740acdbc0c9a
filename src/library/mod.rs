//! Album storage on the local filesystem.
//!
//! The filesystem is the only source of truth for albums and assets. This
//! module owns the on-disk layout and the name sanitisation that keeps every
//! request inside the root.

mod album;
mod names;

pub use album::{album_files, AlbumName, AlbumStore, Asset, AssetEntry, THUMB_DIR};
pub use names::{safe_album, sanitize_filename, validate_filename};
