//! Thumbnail derivation.
//!
//! Turns an image, RAW or video asset into a bounded JPEG, cached on disk
//! next to the album and in memory in front of that.

mod cache;
mod decode;
mod encoder;
mod raw;
mod service;
mod store;

pub use cache::{ThumbCacheKey, ThumbnailCache, DEFAULT_THUMB_MEMORY_CAPACITY};
pub use decode::{
    Capability, DecoderSettings, DecoderTable, FrameSource, ImageSource, RawSource, VideoSource,
    DEFAULT_FFMPEG, DEFAULT_FFMPEG_TIMEOUT,
};
pub use encoder::{
    clamp_quality, fit_within, is_valid_quality, ThumbnailEncoder, DEFAULT_JPEG_QUALITY,
    DEFAULT_THUMB_SIZE, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use raw::SensorFrame;
pub use service::{Thumbnail, ThumbnailService, ThumbnailStats, PLACEHOLDER_GIF};
