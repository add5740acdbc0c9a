//! Test utilities for integration tests.
//!
//! Builds a full application over a temporary album root, plus helpers for
//! requests, multipart bodies and image fixtures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use album_streamer::archive::ArchiveService;
use album_streamer::ingest::IngestPool;
use album_streamer::library::{AlbumName, AlbumStore};
use album_streamer::server::{create_router, AppState, RouterConfig};
use album_streamer::thumb::{DecoderTable, ThumbnailEncoder, ThumbnailService};

/// Boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "album-test-boundary";

// =============================================================================
// Test Application
// =============================================================================

/// A complete application over a temporary root.
pub struct TestApp {
    pub dir: TempDir,
    pub store: AlbumStore,
    pub thumbs: Arc<ThumbnailService>,
    pub archives: Arc<ArchiveService>,
    pub ingest: Arc<IngestPool>,
    pub router: Router,
}

impl TestApp {
    /// Image and RAW decoders only, 32px thumbnails.
    pub fn new() -> Self {
        Self::with_table(DecoderTable::builtin(true))
    }

    pub fn with_table(table: DecoderTable) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(dir.path());
        let thumbs = Arc::new(ThumbnailService::new(
            store.clone(),
            table,
            ThumbnailEncoder::new(32, 80),
        ));
        let archives = Arc::new(ArchiveService::new(store.clone()));
        let ingest = Arc::new(IngestPool::new(store.clone(), thumbs.clone(), 2));

        let state = AppState::new(
            store.clone(),
            thumbs.clone(),
            archives.clone(),
            ingest.clone(),
        )
        .with_chunk_size(4);
        let router = create_router(state, RouterConfig::new().with_tracing(false));

        Self {
            dir,
            store,
            thumbs,
            archives,
            ingest,
            router,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `data` as `album/name`, creating the album.
    pub fn add_file(&self, album: &str, name: &str, data: &[u8]) -> PathBuf {
        let dir = self.root().join(album);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    pub fn album(&self, name: &str) -> AlbumName {
        AlbumName::parse(name).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_range(&self, uri: &str, range: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Upload `files` as repeated `file` fields.
    pub async fn upload(&self, album: &str, files: &[(&str, &[u8])]) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/albums/{}", album))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(files)))
                .unwrap(),
        )
        .await
    }
}

// =============================================================================
// Body Helpers
// =============================================================================

pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap()
}

/// `data:` payloads of a server-sent event stream, in order.
pub fn sse_data(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

/// A `multipart/form-data` body with one `file` part per entry.
pub fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// Create a test RGB JPEG image.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x % 256) as u8;
        let g = (y % 256) as u8;
        let b = ((x + y) % 256) as u8;
        Rgb([r, g, b])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// A test JPEG carrying EXIF Orientation 6 (displayed rotated 90° clockwise).
pub fn create_rotated_jpeg(width: u32, height: u32) -> Vec<u8> {
    let plain = create_test_jpeg(width, height);

    let tiff: [u8; 26] = [
        b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, 0x00, 0x01, 0x01, 0x12, 0x00, 0x03,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let mut out = plain[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&plain[2..]);
    out
}

/// Create a test PNG image.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 64, 128]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if data is a valid JPEG.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    if data[0] != 0xFF || data[1] != 0xD8 {
        return false;
    }

    if data[data.len() - 2] != 0xFF || data[data.len() - 1] != 0xD9 {
        return false;
    }

    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).is_ok()
}

pub fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF89a") || data.starts_with(b"GIF87a")
}

/// Entry names and contents of a zip archive.
pub fn zip_entries(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        entries.push((file.name().to_string(), contents));
    }
    entries.sort();
    entries
}
