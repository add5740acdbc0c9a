//! Configuration management for Album Streamer.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `ALBUM_` prefix
//! - Sensible defaults for all settings
//!
//! # Example
//!
//! ```ignore
//! use album_streamer::config::{Cli, Command};
//! use clap::Parser;
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Check(config) => println!("Checking {}", config.root.display()),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `ALBUM_HOST` - Server bind address (default: 0.0.0.0)
//! - `ALBUM_PORT` - Server port (default: 5000)
//! - `ALBUM_ROOT` - Album root directory (default: uploads)
//! - `ALBUM_THUMB_SIZE` - Longest thumbnail edge in pixels (default: 320)
//! - `ALBUM_JPEG_QUALITY` - Thumbnail JPEG quality (default: 75)
//! - `ALBUM_THUMB_CACHE_BYTES` - In-memory thumbnail cache (default: 32 MiB)
//! - `ALBUM_CHUNK_SIZE` - Streaming chunk size (default: 64 KiB)
//! - `ALBUM_WORKERS` - Concurrent upload post-processing tasks (default: 4)
//! - `ALBUM_MAX_UPLOAD_BYTES` - Request body limit (default: 5 GiB)
//! - `ALBUM_ARCHIVE_TTL` - Seconds before an undelivered archive is swept (default: 3600)
//! - `ALBUM_SWEEP_INTERVAL` - Seconds between sweeps (default: 300)
//! - `ALBUM_FFMPEG` - ffmpeg executable (default: ffmpeg)
//! - `ALBUM_FFMPEG_TIMEOUT` - Seconds allowed per frame grab (default: 30)
//! - `ALBUM_RAW_HALF_SIZE` - Develop RAW thumbnails at half resolution (default: true)
//! - `ALBUM_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `ALBUM_CACHE_MAX_AGE` - Thumbnail Cache-Control max-age (default: 3600)

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::archive::{DEFAULT_ARCHIVE_TTL, DEFAULT_SWEEP_INTERVAL};
use crate::ingest::DEFAULT_INGEST_WORKERS;
use crate::io::DEFAULT_CHUNK_SIZE;
use crate::server::{RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::thumb::{
    is_valid_quality, DecoderSettings, DEFAULT_FFMPEG, DEFAULT_FFMPEG_TIMEOUT,
    DEFAULT_JPEG_QUALITY, DEFAULT_THUMB_MEMORY_CAPACITY, DEFAULT_THUMB_SIZE,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default album root.
pub const DEFAULT_ROOT: &str = "uploads";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

pub const DEFAULT_ARCHIVE_TTL_SECS: u64 = DEFAULT_ARCHIVE_TTL.as_secs();
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = DEFAULT_SWEEP_INTERVAL.as_secs();
pub const DEFAULT_FFMPEG_TIMEOUT_SECS: u64 = DEFAULT_FFMPEG_TIMEOUT.as_secs();

/// Largest thumbnail edge accepted by `validate`.
pub const MAX_THUMB_SIZE: u32 = 4096;

// =============================================================================
// CLI
// =============================================================================

/// Album Streamer - serves media albums from a local directory.
///
/// Streams originals with range support, derives thumbnails for images, RAW
/// photos and videos, and packs whole albums into zip archives.
#[derive(Parser, Debug, Clone)]
#[command(name = "album-streamer")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for `serve` when no subcommand is given
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The selected command; `serve` when none was named.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeConfig),

    /// Report decoder capabilities and the albums under the root
    Check(CheckConfig),
}

// =============================================================================
// Serve Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "ALBUM_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "ALBUM_PORT")]
    pub port: u16,

    /// Directory holding one subdirectory per album.
    #[arg(long, default_value = DEFAULT_ROOT, env = "ALBUM_ROOT")]
    pub root: PathBuf,

    /// Largest accepted request body in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "ALBUM_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Chunk size in bytes for streamed responses.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, env = "ALBUM_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Uploads post-processed concurrently.
    #[arg(long, default_value_t = DEFAULT_INGEST_WORKERS, env = "ALBUM_WORKERS")]
    pub workers: usize,

    // =========================================================================
    // Thumbnail Configuration
    // =========================================================================
    /// Longest thumbnail edge in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMB_SIZE, env = "ALBUM_THUMB_SIZE")]
    pub thumb_size: u32,

    /// Thumbnail JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "ALBUM_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Bytes of encoded thumbnails kept in memory.
    #[arg(long, default_value_t = DEFAULT_THUMB_MEMORY_CAPACITY, env = "ALBUM_THUMB_CACHE_BYTES")]
    pub thumb_cache_bytes: usize,

    /// HTTP Cache-Control max-age in seconds for thumbnails.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "ALBUM_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    #[command(flatten)]
    pub decoders: DecoderArgs,

    // =========================================================================
    // Archive Configuration
    // =========================================================================
    /// Seconds before an undelivered archive is removed.
    #[arg(long, default_value_t = DEFAULT_ARCHIVE_TTL_SECS, env = "ALBUM_ARCHIVE_TTL")]
    pub archive_ttl: u64,

    /// Seconds between archive sweeps.
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS, env = "ALBUM_SWEEP_INTERVAL")]
    pub sweep_interval: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "ALBUM_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.root.as_os_str().is_empty() {
            return Err("Album root is required. Set --root or ALBUM_ROOT".to_string());
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.thumb_size == 0 || self.thumb_size > MAX_THUMB_SIZE {
            return Err(format!(
                "thumb_size must be between 1 and {}",
                MAX_THUMB_SIZE
            ));
        }

        if self.chunk_size < 1024 || self.chunk_size > 16 * 1024 * 1024 {
            return Err("chunk_size must be between 1KB and 16MB".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if self.sweep_interval == 0 {
            return Err("sweep_interval must be greater than 0".to_string());
        }

        self.decoders.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn archive_ttl(&self) -> Duration {
        Duration::from_secs(self.archive_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    /// Router settings derived from this configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_cache_max_age(self.cache_max_age)
            .with_max_upload_bytes(self.max_upload_bytes)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Decoder Configuration
// =============================================================================

/// Options shared by `serve` and `check` that decide which decoders exist.
#[derive(Args, Debug, Clone)]
pub struct DecoderArgs {
    /// ffmpeg executable used for video thumbnails.
    #[arg(long, default_value = DEFAULT_FFMPEG, env = "ALBUM_FFMPEG")]
    pub ffmpeg: PathBuf,

    /// Seconds allowed for one ffmpeg frame grab.
    #[arg(long, default_value_t = DEFAULT_FFMPEG_TIMEOUT_SECS, env = "ALBUM_FFMPEG_TIMEOUT")]
    pub ffmpeg_timeout: u64,

    /// Develop RAW thumbnails at half resolution.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "ALBUM_RAW_HALF_SIZE"
    )]
    pub raw_half_size: bool,
}

impl DecoderArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.ffmpeg.as_os_str().is_empty() {
            return Err("ffmpeg path must not be empty".to_string());
        }
        if self.ffmpeg_timeout == 0 {
            return Err("ffmpeg_timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn settings(&self) -> DecoderSettings {
        DecoderSettings {
            raw_half_size: self.raw_half_size,
            ffmpeg: self.ffmpeg.clone(),
            ffmpeg_timeout: Duration::from_secs(self.ffmpeg_timeout),
        }
    }
}

// =============================================================================
// Check Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Directory holding one subdirectory per album.
    #[arg(long, default_value = DEFAULT_ROOT, env = "ALBUM_ROOT")]
    pub root: PathBuf,

    #[command(flatten)]
    pub decoders: DecoderArgs,

    /// List every album with its asset count.
    #[arg(long, default_value_t = false)]
    pub list_albums: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
