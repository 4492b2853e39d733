use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{Result, StateError};

/// A JSON document stored at a fixed path
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document. A missing file is `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value = serde_json::from_slice(&data).map_err(|source| StateError::Serialization {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Encode and atomically replace the document
    pub fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        let data = self.encode(value)?;
        self.write(&data)
    }

    /// [`store`](Self::store) for async callers; the write and fsync run on
    /// the blocking pool
    pub async fn persist<T: Serialize>(&self, value: &T) -> Result<()> {
        let data = self.encode(value)?;
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.write(&data))
            .await
            .map_err(|e| StateError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(value).map_err(|source| StateError::Serialization {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = self.temp_path();
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(io_err(e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_err(e));
        }

        debug!(path = %self.path.display(), bytes = data.len(), "State file written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
