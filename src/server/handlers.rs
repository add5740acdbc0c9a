//! HTTP request handlers for the album API.
//!
//! Handlers are thin: they parse names, call the library, thumbnail, archive
//! or ingest layer, and turn the result into headers and a body.
//!
//! # Endpoints
//!
//! - `GET  /health`
//! - `GET  /albums`
//! - `GET  /albums/{album}` / `POST /albums/{album}` (multipart upload)
//! - `GET  /albums/{album}/stream/{file}`
//! - `GET  /albums/{album}/thumb/{file}`
//! - `GET  /albums/{album}/preview/{file}`
//! - `GET  /albums/{album}/download/{file}`
//! - `POST /albums/{album}/delete`
//! - `POST /albums/{album}/delete_all`
//! - `GET  /albums/{album}/pack` (server-sent events)
//! - `GET  /albums/{album}/download_all`

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::archive::{ArchiveService, ProgressEvent};
use crate::error::{ArchiveError, LibraryError, RangeError};
use crate::ingest::{IngestPool, IngestReport, StagedUpload};
use crate::io::{open_span, resolve_range, unsatisfied_content_range, RangeDecision, DEFAULT_CHUNK_SIZE};
use crate::library::{sanitize_filename, AlbumName, AlbumStore, Asset, AssetEntry};
use crate::media::{is_allowed, mime_type};
use crate::thumb::{Thumbnail, ThumbnailService};

/// Header reporting whether a thumbnail came from a cache.
pub const THUMBNAIL_CACHE_HIT_HEADER: &str = "x-thumbnail-cache-hit";

/// Multipart field carrying uploaded files.
const UPLOAD_FIELD: &str = "file";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: AlbumStore,
    pub thumbs: Arc<ThumbnailService>,
    pub archives: Arc<ArchiveService>,
    pub ingest: Arc<IngestPool>,

    /// Chunk size for streamed file bodies
    pub chunk_size: usize,

    /// Cache-Control max-age in seconds for thumbnails
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(
        store: AlbumStore,
        thumbs: Arc<ThumbnailService>,
        archives: Arc<ArchiveService>,
        ingest: Arc<IngestPool>,
    ) -> Self {
        Self {
            store,
            thumbs,
            archives,
            ingest,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_max_age: 3600,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Path parameters for per-file routes.
#[derive(Debug, Deserialize)]
pub struct FilePathParams {
    pub album: String,
    pub file: String,
}

/// Body of `POST /albums/{album}/delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub file: String,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "busy")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from `GET /albums`.
#[derive(Debug, Serialize)]
pub struct AlbumsResponse {
    pub albums: Vec<String>,
}

/// Response from `GET /albums/{album}`.
#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub album: String,
    /// Newest first
    pub assets: Vec<AssetEntry>,
}

/// Acknowledgement for mutations.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build the JSON error response, logging by severity:
/// - 5xx at ERROR
/// - 404 at DEBUG (common and expected)
/// - other 4xx at WARN
fn error_response(status: StatusCode, error_type: &'static str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let error_response = ErrorResponse::with_status(error_type, message, status);
    (status, Json(error_response)).into_response()
}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            LibraryError::InvalidAlbumName(_) => (StatusCode::BAD_REQUEST, "invalid_album"),
            LibraryError::InvalidFileName(_) => (StatusCode::BAD_REQUEST, "invalid_filename"),
            LibraryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            LibraryError::Unsupported { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_type")
            }
            LibraryError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
        };
        error_response(status, error_type, self.to_string())
    }
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ArchiveError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ArchiveError::Busy(_) => (StatusCode::CONFLICT, "busy"),
            ArchiveError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "archive_error"),
        };
        error_response(status, error_type, self.to_string())
    }
}

/// Wrapper for handler errors to implement IntoResponse.
#[derive(Debug)]
pub enum HandlerError {
    Library(LibraryError),
    Archive(ArchiveError),

    /// Unsatisfiable range against a resource of `total` bytes
    Range { error: RangeError, total: u64 },

    /// Malformed request body
    BadRequest(String),

    /// Failure outside the library layers (e.g. writing an upload)
    Internal(String),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Library(e) => e.into_response(),
            HandlerError::Archive(e) => e.into_response(),
            HandlerError::Range { error, total } => {
                let mut response = error_response(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    "range_not_satisfiable",
                    error.to_string(),
                );
                if let Ok(value) = HeaderValue::from_str(&unsatisfied_content_range(total)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
                response
            }
            HandlerError::BadRequest(message) => {
                error_response(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            HandlerError::Internal(message) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}

impl From<LibraryError> for HandlerError {
    fn from(err: LibraryError) -> Self {
        HandlerError::Library(err)
    }
}

impl From<ArchiveError> for HandlerError {
    fn from(err: ArchiveError) -> Self {
        HandlerError::Archive(err)
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

async fn resolve_asset(
    state: &AppState,
    params: &FilePathParams,
) -> Result<Asset, HandlerError> {
    let album = AlbumName::parse(&params.album)?;
    Ok(state.store.asset(&album, &params.file).await?)
}

/// Stream an asset, honouring a single `Range` header.
async fn serve_file(
    state: &AppState,
    asset: &Asset,
    headers: &HeaderMap,
    disposition: Option<String>,
) -> Result<Response, HandlerError> {
    let range_error = |error| HandlerError::Range {
        error,
        total: asset.len,
    };
    let range_header = headers
        .get(header::RANGE)
        .map(|v| {
            v.to_str().map_err(|_| {
                range_error(RangeError::Malformed(
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                ))
            })
        })
        .transpose()?;

    let decision = resolve_range(asset.len, range_header).map_err(range_error)?;
    let (offset, len) = decision.span();

    let what = format!("{}/{}", asset.album, asset.filename);
    let stream = open_span(&asset.path, offset, len, state.chunk_size)
        .await
        .map_err(|e| LibraryError::from_io(e, &what))?;

    let mut response = Body::from_stream(stream).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_type(&asset.filename)),
    );
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    if let Some(disposition) = disposition {
        let value = HeaderValue::from_str(&disposition)
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }

    if let RangeDecision::Partial(range) = decision {
        let value = HeaderValue::from_str(&range.content_range())
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        response_headers.insert(header::CONTENT_RANGE, value);
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    }

    Ok(response)
}

/// `Content-Disposition` for an attachment, with an RFC 5987 UTF-8 name.
pub fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `200 OK` with `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /albums`: sorted album names.
pub async fn albums_handler(
    State(state): State<AppState>,
) -> Result<Json<AlbumsResponse>, HandlerError> {
    let albums = state.store.list_albums().await?;
    Ok(Json(AlbumsResponse { albums }))
}

/// `GET /albums/{album}`: the album's assets, newest first.
///
/// # Errors
///
/// - `400 Bad Request`: album name is empty after sanitisation
/// - `404 Not Found`: album does not exist
pub async fn album_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
) -> Result<Json<AlbumResponse>, HandlerError> {
    let album = AlbumName::parse(&album)?;
    if !state.store.album_exists(&album).await {
        return Err(LibraryError::NotFound(album.to_string()).into());
    }

    let assets = state.store.list_assets(&album).await?;
    Ok(Json(AlbumResponse {
        album: album.to_string(),
        assets: assets.iter().map(AssetEntry::from).collect(),
    }))
}

/// `POST /albums/{album}`: multipart upload, field `file` (repeatable).
///
/// Each file is streamed to a hidden staging file, then handed to the
/// ingest pool. The response waits for every file.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, HandlerError> {
    let album = AlbumName::parse(&album)?;
    let album_dir = state.store.create_album(&album).await?;

    let mut staged: Vec<StagedUpload> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();

    let received = async {
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| HandlerError::BadRequest(e.body_text()))?
        {
            if field.name() != Some(UPLOAD_FIELD) {
                continue;
            }
            let Some(raw_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            if raw_name.is_empty() {
                continue;
            }

            let name = match sanitize_filename(&raw_name) {
                Ok(name) if is_allowed(&name) => name,
                Ok(name) => {
                    debug!(album = %album, file = %name, "Rejected upload type");
                    rejected.push(name);
                    continue;
                }
                Err(e) => {
                    debug!(album = %album, "Rejected upload: {}", e);
                    rejected.push(raw_name);
                    continue;
                }
            };

            let (upload, mut file) = StagedUpload::create(&album_dir, &name)
                .await
                .map_err(|e| HandlerError::Internal(format!("{}: {}", name, e)))?;
            staged.push(upload);

            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| HandlerError::BadRequest(e.body_text()))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| HandlerError::Internal(format!("{}: {}", name, e)))?;
            }
            file.flush()
                .await
                .map_err(|e| HandlerError::Internal(format!("{}: {}", name, e)))?;
        }
        Ok::<(), HandlerError>(())
    }
    .await;

    if let Err(e) = received {
        for upload in staged {
            upload.discard().await;
        }
        return Err(e);
    }

    let mut report = state.ingest.ingest(&album, staged).await;
    rejected.append(&mut report.rejected);
    report.rejected = rejected;
    Ok(Json(report))
}

/// `GET /albums/{album}/stream/{file}`: byte-range streaming.
///
/// # Response
///
/// - `200 OK`: whole file (no `Range` header)
/// - `206 Partial Content`: `Content-Range: bytes {start}-{end}/{total}`
/// - `416 Range Not Satisfiable`: `Content-Range: bytes */{total}`
/// - `404 Not Found` / `415 Unsupported Media Type`
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(params): Path<FilePathParams>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let asset = resolve_asset(&state, &params).await?;
    serve_file(&state, &asset, &headers, None).await
}

/// `GET /albums/{album}/thumb/{file}`: JPEG thumbnail or GIF placeholder.
///
/// # Headers
///
/// - `Content-Type: image/jpeg` or `image/gif`
/// - `Cache-Control: public, max-age={cache_max_age}` (placeholder: `no-cache`)
/// - `X-Thumbnail-Cache-Hit: true|false`
pub async fn thumb_handler(
    State(state): State<AppState>,
    Path(params): Path<FilePathParams>,
) -> Result<Response, HandlerError> {
    let asset = resolve_asset(&state, &params).await?;
    let thumbnail = state.thumbs.derive(&asset).await;

    let cache_control = match thumbnail {
        Thumbnail::Ready { .. } => format!("public, max-age={}", state.cache_max_age),
        Thumbnail::Unavailable { .. } => "no-cache".to_string(),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, thumbnail.content_type().to_string()),
            (header::CACHE_CONTROL, cache_control),
            (
                header::HeaderName::from_static(THUMBNAIL_CACHE_HIT_HEADER),
                thumbnail.cache_hit().to_string(),
            ),
        ],
        thumbnail.body(),
    )
        .into_response())
}

/// `GET /albums/{album}/preview/{file}`: RAW rendered to JPEG; anything
/// else (or a RAW file that fails to develop) is served as is.
pub async fn preview_handler(
    State(state): State<AppState>,
    Path(params): Path<FilePathParams>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let asset = resolve_asset(&state, &params).await?;

    match state.thumbs.preview(&asset).await {
        Ok(Some(jpeg)) => {
            return Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response());
        }
        Ok(None) => {}
        Err(e) => {
            debug!(album = %asset.album, file = %asset.filename, "Preview failed, serving original: {}", e);
        }
    }

    serve_file(&state, &asset, &headers, None).await
}

/// `GET /albums/{album}/download/{file}`: the original as an attachment.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(params): Path<FilePathParams>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let asset = resolve_asset(&state, &params).await?;
    let disposition = attachment_disposition(&asset.filename);
    serve_file(&state, &asset, &headers, Some(disposition)).await
}

/// `POST /albums/{album}/delete` with `{"file": name}`.
///
/// Idempotent: deleting a missing file still answers `{"ok": true}`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<OkResponse>, HandlerError> {
    let album = AlbumName::parse(&album)?;
    let removed = state.store.delete_asset(&album, &request.file).await?;
    state.thumbs.invalidate(&album, &request.file).await;

    debug!(album = %album, file = %request.file, removed, "Delete requested");
    Ok(OkResponse::ok())
}

/// `POST /albums/{album}/delete_all`: remove every asset, thumbnail and
/// archive, leaving an empty album.
pub async fn delete_all_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
) -> Result<Json<OkResponse>, HandlerError> {
    let album = AlbumName::parse(&album)?;
    state.store.clear_album(&album).await?;
    state.thumbs.invalidate_album(&album).await;

    warn!(album = %album, "Album cleared");
    Ok(OkResponse::ok())
}

/// `GET /albums/{album}/pack`: build the album archive, reporting progress
/// as server-sent events.
///
/// # Wire format
///
/// ```text
/// data: 0.5000
///
/// data: 1.0000
///
/// data: done
/// ```
///
/// A failed build ends with `event: error` and the reason as data.
///
/// # Errors
///
/// - `404 Not Found`: album does not exist
/// - `409 Conflict`: a build for this album is already running
pub async fn pack_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
) -> Result<Response, HandlerError> {
    let album = AlbumName::parse(&album)?;
    let build = state.archives.build(&album).await?;

    let events = build
        .into_stream()
        .map(|event| Ok::<Event, Infallible>(sse_event(&event)));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// SSE framing of one progress event.
pub fn sse_event(event: &ProgressEvent) -> Event {
    match event {
        ProgressEvent::Progress { fraction, .. } => {
            Event::default().data(format!("{:.4}", fraction))
        }
        ProgressEvent::Completed { .. } => Event::default().data("done"),
        ProgressEvent::Failed { reason } => Event::default()
            .event("error")
            .data(reason.replace(['\r', '\n'], " ")),
    }
}

/// `GET /albums/{album}/download_all`: the finished archive, exactly once.
///
/// The file is deleted when the response body is dropped. Never triggers a
/// build; `404 Not Found` if no archive is waiting.
pub async fn download_all_handler(
    State(state): State<AppState>,
    Path(album): Path<String>,
) -> Result<Response, HandlerError> {
    let album = AlbumName::parse(&album)?;
    let download = state.archives.open_download(&album).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, download.len.to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&download.file_name),
            ),
        ],
        Body::from_stream(download.stream),
    )
        .into_response())
}

// =============================================================================
// Tests
// =============================================================================
