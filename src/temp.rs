//! Temporary file management module
//!
//! This module provides RAII-based handling of partial downloads. A partial
//! file is removed automatically unless it is explicitly persisted under its
//! final name.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of partial download files
pub(crate) const PARTIAL_SUFFIX: &str = "part";

/// Guard for a partial download that is deleted on drop
#[derive(Debug)]
pub(crate) struct TempGuard {
    /// Path of the partial file, `None` once persisted
    path: Option<PathBuf>,
}

impl TempGuard {
    /// Get the path to the temporary file
    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Moves the temporary file to its final location
    ///
    /// The rename happens within the same directory, so the final name
    /// either refers to the complete file or does not exist at all.
    pub(crate) fn persist(mut self, destination: &Path) -> io::Result<()> {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::rename(&path, destination) {
                // Hand the file back so drop still cleans it up
                self.path = Some(path);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            // Silently ignore errors during cleanup
            let _ = fs::remove_file(path);
        }
    }
}

/// Creates a partial download file next to its final destination
///
/// The file is named `<stem>.<ulid>.part` inside `directory`, so it never
/// matches the canonical episode file name pattern. The ULID keeps names
/// unique even if an earlier run left a stale partial file behind.
///
/// # Returns
///
/// The opened file together with the guard that removes it on drop.
pub(crate) fn create_partial_file(directory: &Path, stem: &str) -> io::Result<(File, TempGuard)> {
    let ulid = ulid::Ulid::new();
    let path = directory.join(format!("{}.{}.{}", stem, ulid, PARTIAL_SUFFIX));

    let file = File::create(&path)?;

    Ok((file, TempGuard { path: Some(path) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_create_partial_file() {
        let dir = TempDir::new().unwrap();
        let (_file, temp) = create_partial_file(dir.path(), "S1E01").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        assert!(path.is_file());

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("S1E01."));
        assert!(filename.ends_with(".part"));

        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_partial_files_unique() {
        let dir = TempDir::new().unwrap();
        let (_f1, temp1) = create_partial_file(dir.path(), "S1E01").unwrap();
        let (_f2, temp2) = create_partial_file(dir.path(), "S1E01").unwrap();

        assert_ne!(temp1.path(), temp2.path());
        assert!(temp1.path().exists());
        assert!(temp2.path().exists());
    }

    #[test]
    fn test_persist_moves_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("S1E01.mp4");

        let (mut file, temp) = create_partial_file(dir.path(), "S1E01").unwrap();
        file.write_all(b"video").unwrap();
        drop(file);
        let partial = temp.path().to_path_buf();

        temp.persist(&destination).unwrap();

        assert!(!partial.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"video");
    }

    #[test]
    fn test_failed_persist_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let (_file, temp) = create_partial_file(dir.path(), "S1E01").unwrap();
        let partial = temp.path().to_path_buf();

        let result = temp.persist(&dir.path().join("missing").join("S1E01.mp4"));
        assert!(result.is_err());
        assert!(!partial.exists());
    }
}
