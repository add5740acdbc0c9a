//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   /albums/{album}/{stream,thumb,preview,download,pack,...}      │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error → JSON) │  │ (router config, CORS, trace)│  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!          │              │               │              │
//!          ▼              ▼               ▼              ▼
//!     AlbumStore   ThumbnailService  ArchiveService  IngestPool
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    album_handler, albums_handler, attachment_disposition, delete_all_handler, delete_handler,
    download_all_handler, download_handler, health_handler, pack_handler, preview_handler,
    sse_event, stream_handler, thumb_handler, upload_handler, AlbumResponse, AlbumsResponse,
    AppState, DeleteRequest, ErrorResponse, FilePathParams, HandlerError, HealthResponse,
    OkResponse, THUMBNAIL_CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
