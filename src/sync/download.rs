//! Single-file download with integrity check and atomic publish

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::{FetchError, SyncClient, read_chunk};
use super::models::ManifestItem;
use super::verify::digest_matches;

/// Suffix of in-flight downloads. The garbage collector never touches these.
pub const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Request(FetchError),

    #[error("size mismatch: expected {expected} bytes, received {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("sha256 mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,
}

impl From<FetchError> for DownloadError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Cancelled => DownloadError::Cancelled,
            other => DownloadError::Request(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Temp path for `dest` that is not in `taken`.
///
/// Normally `dest.tmp`. When a manifest entry (or another transfer) already
/// owns that name, a counter is inserted: `dest.1.tmp`, `dest.2.tmp`, ...
pub fn temp_path_for(dest: &Path, taken: &HashSet<PathBuf>) -> PathBuf {
    let mut candidate = with_suffix(dest, TEMP_SUFFIX);
    let mut counter: u32 = 0;
    while taken.contains(&candidate) {
        counter += 1;
        candidate = with_suffix(dest, &format!(".{counter}{TEMP_SUFFIX}"));
    }
    candidate
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Download `item` to `dest` through `temp_path`, returning the number of
/// bytes written.
///
/// The body is streamed into the temp file and hashed on the way. Size and
/// digest are checked before the temp file is renamed over `dest`; on any
/// failure the temp file is removed and `dest` is left as it was.
pub async fn download(
    client: &SyncClient,
    item: &ManifestItem,
    dest: &Path,
    temp_path: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    match stream_to_temp(client, item, temp_path, cancel).await {
        Ok(bytes) => {
            if let Err(e) = fs::rename(temp_path, dest).await {
                let _ = fs::remove_file(temp_path).await;
                return Err(e.into());
            }
            debug!(filename = %item.filename, bytes, "File published");
            Ok(bytes)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            Err(e)
        }
    }
}

async fn stream_to_temp(
    client: &SyncClient,
    item: &ManifestItem,
    temp_path: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut response = client.open_download(&item.id, cancel).await?;

    if let Some(parent) = temp_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut writer = BufWriter::new(File::create(temp_path).await?);
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;

    while let Some(chunk) = read_chunk(&mut response, cancel).await? {
        received += chunk.len() as u64;
        if received > item.file_size_bytes {
            return Err(DownloadError::SizeMismatch {
                expected: item.file_size_bytes,
                actual: received,
            });
        }
        hasher.update(&chunk);
        writer.write_all(&chunk).await?;
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    if received != item.file_size_bytes {
        return Err(DownloadError::SizeMismatch {
            expected: item.file_size_bytes,
            actual: received,
        });
    }

    let actual = format!("{:x}", hasher.finalize());
    if !digest_matches(&actual, &item.sha256) {
        return Err(DownloadError::HashMismatch {
            expected: item.sha256.clone(),
            actual,
        });
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_appends_suffix() {
        let taken = HashSet::new();
        assert_eq!(
            temp_path_for(Path::new("/media/clip.mp4"), &taken),
            PathBuf::from("/media/clip.mp4.tmp")
        );
        assert_eq!(
            temp_path_for(Path::new("/media/.hidden"), &taken),
            PathBuf::from("/media/.hidden.tmp")
        );
    }

    #[test]
    fn test_temp_path_avoids_taken_names() {
        let taken: HashSet<PathBuf> = ["/media/clip.tmp", "/media/clip.1.tmp"]
            .into_iter()
            .map(PathBuf::from)
            .collect();

        let temp = temp_path_for(Path::new("/media/clip"), &taken);

        assert_eq!(temp, PathBuf::from("/media/clip.2.tmp"));
        assert!(temp.to_string_lossy().ends_with(TEMP_SUFFIX));
    }

    #[test]
    fn test_cancelled_fetch_maps_to_cancelled() {
        let err: DownloadError = FetchError::Cancelled.into();
        assert!(matches!(err, DownloadError::Cancelled));

        let err: DownloadError = FetchError::Timeout.into();
        assert!(matches!(err, DownloadError::Request(FetchError::Timeout)));
    }
}
