//! # Album Streamer
//!
//! A media album server backed by a local directory tree.
//!
//! Albums are plain directories under a root; the filesystem is the only
//! source of truth. On top of that the library provides:
//!
//! - **Range streaming**: originals are served in chunks, honouring a single
//!   `Range` header
//! - **Thumbnails**: bounded JPEGs derived from images, RAW photos and video
//!   frames, cached on disk and in memory and invalidated by mtime
//! - **Archives**: whole albums packed into a zip with typed progress events,
//!   delivered once and swept if never fetched
//! - **Ingest**: uploads staged, committed and post-processed by a bounded
//!   worker pool, with a SHA-256 integrity tag per file
//!
//! ## Architecture
//!
//! - [`media`] - Content classification and digests
//! - [`library`] - Album layout and name sanitisation
//! - [`io`] - Range resolution and chunked file spans
//! - [`thumb`] - Decoder strategies, encoder and thumbnail caches
//! - [`archive`] - Archive builder, download and sweeper
//! - [`ingest`] - Upload worker pool
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use album_streamer::{
//!     create_router, AlbumStore, AppState, ArchiveService, DecoderTable, IngestPool,
//!     RouterConfig, ThumbnailEncoder, ThumbnailService,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = AlbumStore::new("uploads");
//!     let thumbs = Arc::new(ThumbnailService::new(
//!         store.clone(),
//!         DecoderTable::builtin(true),
//!         ThumbnailEncoder::default(),
//!     ));
//!     let archives = Arc::new(ArchiveService::new(store.clone()));
//!     let ingest = Arc::new(IngestPool::new(store.clone(), thumbs.clone(), 4));
//!
//!     let state = AppState::new(store, thumbs, archives, ingest);
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod library;
pub mod media;
pub mod server;
pub mod thumb;

// Re-export commonly used types
pub use archive::{ArchiveBuild, ArchiveDownload, ArchiveService, ProgressEvent};
pub use config::{CheckConfig, Cli, Command, DecoderArgs, ServeConfig};
pub use error::{ArchiveError, DigestError, LibraryError, RangeError, ThumbnailError};
pub use ingest::{IngestPool, IngestReport, StagedUpload};
pub use io::{open_span, resolve_range, ByteRange, RangeDecision};
pub use library::{AlbumName, AlbumStore, Asset, AssetEntry};
pub use media::{classify, digest, is_allowed, mime_type, MediaKind};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use thumb::{
    DecoderTable, FrameSource, Thumbnail, ThumbnailEncoder, ThumbnailService, PLACEHOLDER_GIF,
};
