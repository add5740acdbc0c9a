//! Frame sources: one decoding strategy per media kind.
//!
//! Every strategy turns a source file into an upright [`DynamicImage`].
//! Strategies are optional; the [`DecoderTable`] records which ones this
//! host can actually run so that a missing decoder is a deterministic
//! "unavailable" rather than a runtime surprise.
//!
//! | Kind  | Strategy      | Requirement            |
//! |-------|---------------|------------------------|
//! | image | `image` crate | always                 |
//! | raw   | `rawloader`   | always                 |
//! | video | `ffmpeg`      | `ffmpeg -version` runs |

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ThumbnailError;
use crate::media::MediaKind;

use super::raw::SensorFrame;

/// Default ffmpeg executable, resolved through `PATH`.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Default bound on a single frame extraction.
pub const DEFAULT_FFMPEG_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on the startup capability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// FrameSource Trait
// =============================================================================

/// A strategy that decodes one representative frame from a file.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Short name for logs and the capability table.
    fn name(&self) -> &'static str;

    /// Decode a frame suitable for thumbnailing.
    async fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError>;

    /// Decode at full resolution. Defaults to [`FrameSource::decode`].
    async fn decode_full(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        self.decode(path).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ThumbnailError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ThumbnailError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ThumbnailError::Decode {
            message: format!("decoder task failed: {}", e),
        })?
}

fn decode_err(e: impl std::fmt::Display) -> ThumbnailError {
    ThumbnailError::Decode {
        message: e.to_string(),
    }
}

// =============================================================================
// Still Images
// =============================================================================

/// Standard raster formats via the `image` crate, EXIF orientation applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSource;

impl ImageSource {
    /// Decode and orient an image file (blocking).
    pub fn decode_blocking(path: &Path) -> Result<DynamicImage, ThumbnailError> {
        let reader = ImageReader::open(path)
            .map_err(|e| ThumbnailError::Io(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(decode_err)?;

        let mut decoder = reader.into_decoder().map_err(decode_err)?;
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);

        let mut img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
        img.apply_orientation(orientation);
        Ok(img)
    }
}

#[async_trait]
impl FrameSource for ImageSource {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        let path = path.to_path_buf();
        blocking(move || Self::decode_blocking(&path)).await
    }
}

// =============================================================================
// RAW
// =============================================================================

/// Camera RAW via rawloader and a binning demosaic.
#[derive(Debug, Clone, Copy)]
pub struct RawSource {
    half_size: bool,
}

impl RawSource {
    pub fn new(half_size: bool) -> Self {
        Self { half_size }
    }

    async fn develop(&self, path: &Path, half_size: bool) -> Result<DynamicImage, ThumbnailError> {
        let path = path.to_path_buf();
        blocking(move || Ok(SensorFrame::load(&path)?.develop(half_size))).await
    }
}

impl Default for RawSource {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl FrameSource for RawSource {
    fn name(&self) -> &'static str {
        "rawloader"
    }

    async fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        self.develop(path, self.half_size).await
    }

    async fn decode_full(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        self.develop(path, false).await
    }
}

// =============================================================================
// Video
// =============================================================================

/// First decodable video frame, extracted by an external `ffmpeg`.
///
/// The frame is piped back as PNG on stdout; nothing touches disk.
#[derive(Debug, Clone)]
pub struct VideoSource {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl VideoSource {
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
        }
    }

    /// Return a source only if `ffmpeg -version` succeeds on this host.
    pub async fn probe(ffmpeg: impl Into<PathBuf>, timeout: Duration) -> Option<Self> {
        let source = Self::new(ffmpeg, timeout);

        let mut cmd = Command::new(&source.ffmpeg);
        cmd.arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(PROBE_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) if status.success() => Some(source),
            Ok(Ok(status)) => {
                debug!(ffmpeg = %source.ffmpeg.display(), %status, "ffmpeg probe failed");
                None
            }
            Ok(Err(e)) => {
                debug!(ffmpeg = %source.ffmpeg.display(), "ffmpeg not runnable: {}", e);
                None
            }
            Err(_) => {
                debug!(ffmpeg = %source.ffmpeg.display(), "ffmpeg probe timed out");
                None
            }
        }
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }
}

#[async_trait]
impl FrameSource for VideoSource {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // kill_on_drop reaps the child when the timeout drops the future
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ThumbnailError::Decode {
                message: format!("frame extraction timed out after {:?}", self.timeout),
            })?
            .map_err(|e| ThumbnailError::Io(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ThumbnailError::Decode {
                message: format!("no frame produced ({}): {}", output.status, stderr.trim()),
            });
        }

        blocking(move || {
            image::load_from_memory_with_format(&output.stdout, ImageFormat::Png).map_err(decode_err)
        })
        .await
    }
}

// =============================================================================
// Decoder Table
// =============================================================================

/// Settings used to build the default table.
#[derive(Debug, Clone)]
pub struct DecoderSettings {
    pub raw_half_size: bool,
    pub ffmpeg: PathBuf,
    pub ffmpeg_timeout: Duration,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            raw_half_size: true,
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
            ffmpeg_timeout: DEFAULT_FFMPEG_TIMEOUT,
        }
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    pub kind: MediaKind,
    pub decoder: Option<&'static str>,
    pub available: bool,
}

/// Strategy per media kind; a `None` slot means the kind cannot be decoded here.
#[derive(Clone, Default)]
pub struct DecoderTable {
    image: Option<Arc<dyn FrameSource>>,
    raw: Option<Arc<dyn FrameSource>>,
    video: Option<Arc<dyn FrameSource>>,
}

impl DecoderTable {
    /// An empty table: every kind is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Image and RAW strategies only. No subprocess is ever spawned.
    pub fn builtin(raw_half_size: bool) -> Self {
        Self::empty()
            .with_source(MediaKind::Image, Arc::new(ImageSource))
            .with_source(MediaKind::Raw, Arc::new(RawSource::new(raw_half_size)))
    }

    /// Built-in strategies plus video if ffmpeg is usable on this host.
    pub async fn probe(settings: &DecoderSettings) -> Self {
        let table = Self::builtin(settings.raw_half_size);

        match VideoSource::probe(&settings.ffmpeg, settings.ffmpeg_timeout).await {
            Some(video) => {
                info!(ffmpeg = %video.ffmpeg().display(), "Video thumbnails enabled");
                table.with_source(MediaKind::Video, Arc::new(video))
            }
            None => {
                info!(
                    ffmpeg = %settings.ffmpeg.display(),
                    "ffmpeg unavailable, video thumbnails disabled"
                );
                table
            }
        }
    }

    /// Register (or replace) the strategy for `kind`. Rejected is ignored.
    pub fn with_source(mut self, kind: MediaKind, source: Arc<dyn FrameSource>) -> Self {
        match kind {
            MediaKind::Image => self.image = Some(source),
            MediaKind::Raw => self.raw = Some(source),
            MediaKind::Video => self.video = Some(source),
            MediaKind::Rejected => {}
        }
        self
    }

    /// Strategy for `kind`, or why there is none.
    pub fn for_kind(&self, kind: MediaKind) -> Result<Arc<dyn FrameSource>, ThumbnailError> {
        let slot = match kind {
            MediaKind::Image => &self.image,
            MediaKind::Raw => &self.raw,
            MediaKind::Video => &self.video,
            MediaKind::Rejected => return Err(ThumbnailError::Unsupported(kind.to_string())),
        };
        slot.clone()
            .ok_or(ThumbnailError::CapabilityMissing(kind.name()))
    }

    pub fn supports(&self, kind: MediaKind) -> bool {
        self.for_kind(kind).is_ok()
    }

    /// Availability of every decodable kind.
    pub fn capabilities(&self) -> Vec<Capability> {
        [MediaKind::Image, MediaKind::Raw, MediaKind::Video]
            .into_iter()
            .map(|kind| {
                let decoder = self.for_kind(kind).ok().map(|s| s.name());
                Capability {
                    kind,
                    decoder,
                    available: decoder.is_some(),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for DecoderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |slot: &Option<Arc<dyn FrameSource>>| slot.as_ref().map(|s| s.name());
        f.debug_struct("DecoderTable")
            .field("image", &name(&self.image))
            .field("raw", &name(&self.raw))
            .field("video", &name(&self.video))
            .finish()
    }
}
