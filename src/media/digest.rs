//! Streaming SHA-256 content digests for uploaded assets.
//!
//! Digests are only logged for traceability. They are not persisted and not
//! compared against other assets.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::DigestError;

/// Block size used when hashing.
pub const DIGEST_BLOCK_SIZE: usize = 8192;

/// Hash the file at `path` in fixed-size blocks (blocking).
pub fn digest_file(path: &Path) -> Result<String, DigestError> {
    let fail = |e: std::io::Error| DigestError {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut file = File::open(path).map_err(fail)?;
    let mut hasher = Sha256::new();
    let mut block = [0u8; DIGEST_BLOCK_SIZE];

    loop {
        let n = file.read(&mut block).map_err(fail)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash the file at `path` on the blocking pool.
pub async fn digest(path: impl Into<PathBuf>) -> Result<String, DigestError> {
    let path = path.into();
    let display = path.display().to_string();

    tokio::task::spawn_blocking(move || digest_file(&path))
        .await
        .map_err(|e| DigestError {
            path: display,
            message: format!("digest task failed: {}", e),
        })?
}
