//! HTTP `Range` header resolution.
//!
//! Only the single-range form `bytes=<start>-<end>` is accepted:
//!
//! - a missing `<start>` is read as 0 (suffix ranges are not supported)
//! - a missing `<end>` means "to the end of the resource"
//! - an `<end>` past the resource is clamped to the last byte
//!
//! Everything else resolves to [`RangeError`], which the server turns into
//! `416 Range Not Satisfiable`.

use crate::error::RangeError;

/// The only range unit we understand.
const BYTES_UNIT: &str = "bytes";

// =============================================================================
// ByteRange
// =============================================================================

/// An inclusive byte span `[start, end]` of a resource of length `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Number of bytes in the span.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Never true for a resolved range; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Value for `Content-Range` on a 416 response.
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{}", total)
}

// =============================================================================
// RangeDecision
// =============================================================================

/// What to send for a streaming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    /// No `Range` header: send the whole resource with 200.
    Full { length: u64 },

    /// Send exactly this span with 206.
    Partial(ByteRange),
}

impl RangeDecision {
    /// Offset and byte count to read from the resource.
    pub fn span(&self) -> (u64, u64) {
        match self {
            RangeDecision::Full { length } => (0, *length),
            RangeDecision::Partial(range) => (range.start, range.len()),
        }
    }
}

/// Resolve an optional `Range` header against a resource of `total` bytes.
pub fn resolve_range(total: u64, header: Option<&str>) -> Result<RangeDecision, RangeError> {
    let Some(header) = header else {
        return Ok(RangeDecision::Full { length: total });
    };

    let (start, end) = parse_range_header(header)?;
    let unsatisfiable = || RangeError::NotSatisfiable { start, end, total };

    if start >= total {
        return Err(unsatisfiable());
    }

    let last = total - 1;
    let end_resolved = end.map_or(last, |e| e.min(last));

    if let Some(e) = end {
        if start > e {
            return Err(unsatisfiable());
        }
    }

    Ok(RangeDecision::Partial(ByteRange {
        start,
        end: end_resolved,
        total,
    }))
}

/// Parse `bytes=<start>-<end>` into `(start, end)` without bounds checks.
fn parse_range_header(header: &str) -> Result<(u64, Option<u64>), RangeError> {
    let malformed = || RangeError::Malformed(header.to_string());

    let (unit, spec) = header.trim().split_once('=').ok_or_else(malformed)?;
    if !unit.trim().eq_ignore_ascii_case(BYTES_UNIT) {
        return Err(malformed());
    }
    if spec.contains(',') {
        return Err(malformed());
    }

    let (start, end) = spec.trim().split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    let start = if start.is_empty() {
        0
    } else {
        parse_bound(start).ok_or_else(malformed)?
    };
    let end = if end.is_empty() {
        None
    } else {
        Some(parse_bound(end).ok_or_else(malformed)?)
    };

    Ok((start, end))
}

/// Decimal digits only: `u64::from_str` would also accept a leading `+`.
fn parse_bound(s: &str) -> Option<u64> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
