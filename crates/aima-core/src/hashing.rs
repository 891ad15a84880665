//! File hashing and sizing for model verification.

use crate::error::{AimaError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Chunk size for reading files (8MB).
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// SHA-256 of a single file as lowercase hex.
///
/// Directories are rejected; hashing a directory has no defined meaning here.
pub fn compute_sha256(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| AimaError::io_with_path(e, path))?;
    if metadata.is_dir() {
        return Err(AimaError::invalid_input(
            "model",
            format!("cannot compute sha256 of directory {}", path.display()),
        ));
    }

    let mut file = std::fs::File::open(path).map_err(|e| AimaError::io_with_path(e, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| AimaError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Async wrapper around [`compute_sha256`] that hashes on the blocking pool.
pub async fn compute_sha256_async(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || compute_sha256(&path))
        .await
        .map_err(|e| AimaError::internal(format!("hash task failed: {}", e)))?
}

/// Size of a file, or the summed size of regular files beneath a directory.
pub fn path_size(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| AimaError::io_with_path(e, path))?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total = 0u64;
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            if let Ok(meta) = entry.metadata() {
                total += meta.len();
            }
        }
    }
    Ok(total)
}
