//! Chunked streaming of a file span.
//!
//! A resolved byte range is never buffered whole: the file is seeked to the
//! start of the span and read in fixed-size chunks, so one huge request
//! yields to the runtime between chunks.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;

/// Default chunk size for streamed responses (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Stream of chunks covering one byte span of a file.
pub type SpanStream = ReaderStream<Take<File>>;

/// Open `path` and return a stream of at most `len` bytes starting at `offset`.
///
/// If the file shrinks concurrently the stream simply ends early.
pub async fn open_span(
    path: &Path,
    offset: u64,
    len: u64,
    chunk_size: usize,
) -> std::io::Result<SpanStream> {
    let mut file = File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(ReaderStream::with_capacity(
        file.take(len),
        chunk_size.max(1),
    ))
}
