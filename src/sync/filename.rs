//! Gate for manifest filenames.
//!
//! Manifest entries come from a remote server, so every filename is checked
//! here before it is joined onto the media root.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidFilename {
    #[error("filename is empty")]
    Empty,

    #[error("filename '{0}' contains a path separator")]
    ContainsSeparator(String),

    #[error("filename '{0}' contains a NUL byte")]
    ContainsNul(String),

    #[error("filename '{0}' is not a clean single path component")]
    NotClean(String),

    #[error("filename '{0}' resolves outside the media root")]
    EscapesRoot(String),
}

/// Validate `filename` and return it as a path relative to `media_root`
pub fn validate_filename(filename: &str, media_root: &Path) -> Result<PathBuf, InvalidFilename> {
    if filename.is_empty() {
        return Err(InvalidFilename::Empty);
    }

    if filename.contains(['/', '\\']) {
        return Err(InvalidFilename::ContainsSeparator(filename.to_string()));
    }

    if filename.contains('\0') {
        return Err(InvalidFilename::ContainsNul(filename.to_string()));
    }

    let candidate = Path::new(filename);
    let mut components = candidate.components();
    let clean = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => PathBuf::from(name),
        (Some(Component::CurDir | Component::ParentDir), None) => {
            return Err(InvalidFilename::EscapesRoot(filename.to_string()));
        }
        _ => return Err(InvalidFilename::NotClean(filename.to_string())),
    };

    if clean.as_os_str() != candidate.as_os_str() {
        return Err(InvalidFilename::NotClean(filename.to_string()));
    }

    let joined = media_root.join(&clean);
    if joined.parent() != Some(media_root) {
        return Err(InvalidFilename::EscapesRoot(filename.to_string()));
    }

    Ok(clean)
}
