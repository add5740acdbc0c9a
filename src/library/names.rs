//! Album and file name sanitisation.
//!
//! Names arrive from URLs, JSON bodies and multipart headers. Both helpers
//! here guarantee the result is a single path component that cannot escape
//! the album root.

use crate::error::LibraryError;

/// Reduce an album name to alphanumerics and `_`.
///
/// Fails if nothing is left.
pub fn safe_album(name: &str) -> Result<String, LibraryError> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    if cleaned.is_empty() {
        return Err(LibraryError::InvalidAlbumName(name.to_string()));
    }
    Ok(cleaned)
}

/// Sanitise a client supplied file name.
///
/// Keeps only the last path component, strips NUL, and replaces anything
/// outside letters, digits, `_`, `(`, `)`, `.`, `-` and space with `_`.
/// UTF-8 names survive. Empty, dot-only and hidden names are rejected.
pub fn sanitize_filename(name: &str) -> Result<String, LibraryError> {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '(' | ')' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    validate_filename(&cleaned).map_err(|_| LibraryError::InvalidFileName(name.to_string()))?;
    Ok(cleaned)
}

/// Check that an already stored file name is a safe single component.
///
/// Unlike [`sanitize_filename`] this never rewrites: a name that would need
/// rewriting cannot refer to a stored asset.
pub fn validate_filename(name: &str) -> Result<(), LibraryError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        || name.trim().is_empty();

    if invalid {
        Err(LibraryError::InvalidFileName(name.to_string()))
    } else {
        Ok(())
    }
}
