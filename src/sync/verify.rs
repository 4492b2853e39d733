//! Local integrity checks: size first, then SHA-256

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use super::models::ManifestItem;

/// Read buffer used while hashing (64KB)
const BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare two hex digests ignoring case
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

/// Whether `path` already holds exactly `item`.
///
/// Missing files and I/O errors count as "not valid"; this is only used to
/// decide whether a download is needed.
pub async fn verify_local(path: &Path, item: &ManifestItem) -> bool {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(_) => return false,
    };

    if !metadata.is_file() || metadata.len() != item.file_size_bytes {
        debug!(path = %path.display(), size = metadata.len(), expected = item.file_size_bytes, "Local size differs");
        return false;
    }

    let owned: PathBuf = path.to_path_buf();
    let digest = match tokio::task::spawn_blocking(move || file_sha256(&owned)).await {
        Ok(Ok(digest)) => digest,
        _ => return false,
    };

    let valid = digest_matches(&digest, &item.sha256);
    if !valid {
        debug!(path = %path.display(), "Local hash differs");
    }
    valid
}
