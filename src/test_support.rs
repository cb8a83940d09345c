//! Scripted collaborators for exercising the download orchestration in tests

use crate::video_download::{DownloadRequest, DownloadedFile, VideoDownloadError, VideoDownloader};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

/// Downloader that fails selected episodes a given number of times
///
/// Successful downloads write a small file under the canonical name when
/// `write_files` is set, so a directory-backed store picks them up.
#[derive(Default)]
pub(crate) struct ScriptedDownloader {
    /// Remaining failures per file stem
    failures: RefCell<HashMap<String, u32>>,
    /// File stems in the order they were requested
    calls: RefCell<Vec<String>>,
    write_files: bool,
}

impl ScriptedDownloader {
    pub fn writing_files() -> Self {
        Self {
            write_files: true,
            ..Self::default()
        }
    }

    /// Makes the download of `stem` fail the next `times` attempts
    pub fn fail(self, stem: &str, times: u32) -> Self {
        self.failures.borrow_mut().insert(stem.to_string(), times);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl VideoDownloader for ScriptedDownloader {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile, VideoDownloadError> {
        self.calls.borrow_mut().push(request.file_stem.to_string());

        if let Some(remaining) = self.failures.borrow_mut().get_mut(request.file_stem) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(VideoDownloadError::NoVideoSource(request.url.to_string()));
            }
        }

        let path = request
            .directory
            .join(format!("{}.{}", request.file_stem, self.extension()));

        if self.write_files {
            fs::write(&path, b"video").map_err(|e| VideoDownloadError::WriteFailed {
                path: path.clone(),
                source: e,
            })?;
        }

        Ok(DownloadedFile { path, bytes: 5 })
    }
}
