//! Router configuration for the album server.
//!
//! # Route Structure
//!
//! ```text
//! /health                                  - Health check
//! /albums                                  - List albums
//! /albums/{album}                          - List assets (GET), upload (POST)
//! /albums/{album}/stream/{file}            - Byte-range streaming
//! /albums/{album}/thumb/{file}             - JPEG thumbnail
//! /albums/{album}/preview/{file}           - RAW preview, original otherwise
//! /albums/{album}/download/{file}          - Original as attachment
//! /albums/{album}/delete                   - Delete one asset (POST)
//! /albums/{album}/delete_all               - Clear the album (POST)
//! /albums/{album}/pack                     - Build archive (SSE progress)
//! /albums/{album}/download_all             - One-shot archive download
//! ```
//!
//! # Example
//!
//! ```ignore
//! use album_streamer::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(store, thumbs, archives, ingest);
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::{CONTENT_TYPE, RANGE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    album_handler, albums_handler, delete_all_handler, delete_handler, download_all_handler,
    download_handler, health_handler, pack_handler, preview_handler, stream_handler,
    thumb_handler, upload_handler, AppState,
};

/// Default request body limit for uploads (5 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for thumbnails
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - Request bodies up to 5 GiB are accepted
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the request body limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// The router's thumbnail `Cache-Control` comes from `config`, overriding
/// whatever `state` carried.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let state = state.with_cache_max_age(config.cache_max_age);
    let cors = build_cors_layer(&config);

    let album_routes = Router::new()
        .route("/", get(albums_handler))
        .route("/{album}", get(album_handler).post(upload_handler))
        .route("/{album}/stream/{file}", get(stream_handler))
        .route("/{album}/thumb/{file}", get(thumb_handler))
        .route("/{album}/preview/{file}", get(preview_handler))
        .route("/{album}/download/{file}", get(download_handler))
        .route("/{album}/delete", post(delete_handler))
        .route("/{album}/delete_all", post(delete_all_handler))
        .route("/{album}/pack", get(pack_handler))
        .route("/{album}/download_all", get(download_all_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/albums", album_routes)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, RANGE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
