mod range;
mod span;

pub use range::{resolve_range, unsatisfied_content_range, ByteRange, RangeDecision};
pub use span::{open_span, SpanStream, DEFAULT_CHUNK_SIZE};
