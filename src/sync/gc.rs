//! Removal of cached files that are no longer in the manifest.
//!
//! Both walks are blocking and run on the blocking pool. Symlinks are never
//! followed and directories are never removed.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::download::TEMP_SUFFIX;

#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct GcError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl GcError {
    fn walk(root: &Path, e: walkdir::Error) -> Self {
        let path = e.path().unwrap_or(root).to_path_buf();
        Self {
            path,
            source: e.into(),
        }
    }
}

/// Delete every regular file under `media_root` whose root-relative path is not
/// in `expected`. Temp files of in-flight downloads are left alone.
///
/// Returns the number of deleted files, or every error hit along the way.
pub fn collect(media_root: &Path, expected: &HashSet<PathBuf>) -> Result<usize, Vec<GcError>> {
    let mut errors = Vec::new();

    let removed = walk_files(media_root, &mut errors, |path, relative| {
        if is_temp(relative) || expected.contains(relative) {
            return Ok(false);
        }
        fs::remove_file(path)?;
        info!(path = %relative.display(), "Removed file absent from manifest");
        Ok(true)
    })
    .into_iter()
    .filter(|deleted| *deleted)
    .count();

    if errors.is_empty() {
        Ok(removed)
    } else {
        Err(errors)
    }
}

/// Delete leftover `.tmp` artifacts of killed transfers.
///
/// Only safe while no download is running. Names listed in `expected` are kept,
/// since a manifest may legitimately contain a file ending in `.tmp`.
pub fn sweep_stale_temps(media_root: &Path, expected: &HashSet<PathBuf>) -> Result<usize, Vec<GcError>> {
    let mut errors = Vec::new();

    let removed = walk_files(media_root, &mut errors, |path, relative| {
        if !is_temp(relative) || expected.contains(relative) {
            return Ok(false);
        }
        fs::remove_file(path)?;
        debug!(path = %relative.display(), "Removed stale temp file");
        Ok(true)
    })
    .into_iter()
    .filter(|deleted| *deleted)
    .count();

    if errors.is_empty() {
        Ok(removed)
    } else {
        Err(errors)
    }
}

fn is_temp(relative: &Path) -> bool {
    relative
        .file_name()
        .map(|name| name.to_string_lossy().ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

/// Visit every regular file below `root`, collecting per-entry errors instead
/// of stopping. Returns the visitor results of the successful visits.
fn walk_files<F>(root: &Path, errors: &mut Vec<GcError>, mut visit: F) -> Vec<bool>
where
    F: FnMut(&Path, &Path) -> io::Result<bool>,
{
    let mut results = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 && is_not_found(&e) => break,
            Err(e) => {
                errors.push(GcError::walk(root, e));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        match visit(entry.path(), relative) {
            Ok(result) => results.push(result),
            Err(source) => errors.push(GcError {
                path: entry.path().to_path_buf(),
                source,
            }),
        }
    }

    results
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error().is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn expected(names: &[&str]) -> HashSet<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_collect_removes_only_unexpected_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "keep.mp4");
        touch(root, "stale.mp4");
        touch(root, "nested/old.png");
        touch(root, "inflight.mp4.tmp");

        let removed = collect(root, &expected(&["keep.mp4"])).unwrap();

        assert_eq!(removed, 2);
        assert!(root.join("keep.mp4").exists());
        assert!(!root.join("stale.mp4").exists());
        assert!(!root.join("nested/old.png").exists());
        assert!(root.join("nested").is_dir());
        assert!(root.join("inflight.mp4.tmp").exists());
    }

    #[test]
    fn test_collect_empty_expected_clears_cache() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.mp4");
        touch(temp.path(), "b.mp4");

        assert_eq!(collect(temp.path(), &HashSet::new()).unwrap(), 2);
    }

    #[test]
    fn test_collect_missing_root_is_noop() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("never-created");
        assert_eq!(collect(&missing, &HashSet::new()).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_does_not_follow_symlinks() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "precious.txt");
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        collect(temp.path(), &HashSet::new()).unwrap();

        assert!(outside.path().join("precious.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_skips_symlinked_files() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "target.mp4");
        touch(temp.path(), "deep/er/stale.mp4");
        std::os::unix::fs::symlink(outside.path().join("target.mp4"), temp.path().join("deep/alias.mp4")).unwrap();

        let removed = collect(temp.path(), &HashSet::new()).unwrap();

        assert_eq!(removed, 1);
        assert!(!temp.path().join("deep/er/stale.mp4").exists());
        assert!(temp.path().join("deep/alias.mp4").symlink_metadata().is_ok());
        assert!(outside.path().join("target.mp4").exists());
    }

    #[test]
    fn test_sweep_stale_temps() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "clip.mp4.tmp");
        touch(root, "listed.tmp");
        touch(root, "clip.mp4");

        let removed = sweep_stale_temps(root, &expected(&["listed.tmp", "clip.mp4"])).unwrap();

        assert_eq!(removed, 1);
        assert!(!root.join("clip.mp4.tmp").exists());
        assert!(root.join("listed.tmp").exists());
        assert!(root.join("clip.mp4").exists());
    }
}
