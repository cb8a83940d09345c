//! Video download module
//!
//! This module defines the contract for transferring a single episode to
//! disk and a timing wrapper that turns the outcome into an
//! [`EpisodeAttempt`] for the season orchestration.

mod http;

pub use http::HttpVideoDownloader;

use crate::ProgressEvent;
use crate::progress_store::EpisodeId;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Extension of the files written by the default downloader
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Errors that can occur while downloading a single video
#[derive(Debug, Error)]
pub enum VideoDownloadError {
    /// The URL could not be parsed
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Failed to set up the HTTP client
    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(reqwest::Error),

    /// The HTTP request failed
    #[error("Failed to request {url}: {source}")]
    RequestFailed { url: String, source: reqwest::Error },

    /// The server answered with a non-success status
    #[error("HTTP {status} while downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// No playable source could be found on the episode page
    #[error("No video source found at {0}")]
    NoVideoSource(String),

    /// Following embedded players did not lead to a video
    #[error("Gave up after following {hops} embedded pages starting at {url}")]
    TooManyHops { url: String, hops: usize },

    /// The downloaded content is not a video
    #[error("Content downloaded from {0} is not a video")]
    NotAVideo(String),

    /// The server returned no content
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Reading the response body failed
    #[error("Failed to read response from {url}: {source}")]
    ReadFailed { url: String, source: io::Error },

    /// The body ended before the announced length was reached
    #[error("Download from {url} ended after {received} of {expected} bytes")]
    Truncated {
        url: String,
        received: u64,
        expected: u64,
    },

    /// Failed to write the video to disk
    #[error("Failed to write video file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Everything needed to download one episode
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    /// Episode page or media URL
    pub url: &'a str,
    /// File name without extension (`S1E05`)
    pub file_stem: &'a str,
    /// Target directory, which must already exist
    pub directory: &'a Path,
    /// User agent to present to the server
    pub user_agent: &'a str,
}

/// A video that was completely written under its final name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Trait for collaborators that transfer a single video to disk
///
/// Implementors must never leave a partial file under the final name: the
/// mere presence of `<file_stem>.<extension>` is treated as a finished
/// download on every later run.
pub trait VideoDownloader {
    /// Extension of the files this downloader produces
    fn extension(&self) -> &str {
        DEFAULT_EXTENSION
    }

    /// Downloads the video behind `request.url` into
    /// `<directory>/<file_stem>.<extension>`
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile, VideoDownloadError>;
}

/// Outcome of a single download attempt
#[derive(Debug, Clone)]
pub struct EpisodeAttempt {
    pub episode: EpisodeId,
    pub elapsed: Duration,
    /// Bytes written, if the attempt succeeded
    pub bytes: Option<u64>,
    /// Error message, if the attempt failed
    pub error: Option<String>,
}

impl EpisodeAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Downloads one episode and reports how it went
///
/// Failures are not propagated: they are logged, reported as
/// [`ProgressEvent::DownloadFailed`] and recorded in the returned attempt so
/// the caller can carry on with the next episode.
///
/// `position` and `total` only serve progress reporting.
pub fn download_episode<D, F>(
    downloader: &D,
    episode: EpisodeId,
    url: &str,
    directory: &Path,
    user_agent: &str,
    (position, total): (u32, u32),
    progress_callback: &mut F,
) -> EpisodeAttempt
where
    D: VideoDownloader + ?Sized,
    F: FnMut(ProgressEvent),
{
    let file_stem = episode.to_string();

    tracing::info!(%episode, url, "Preparing download");
    progress_callback(ProgressEvent::DownloadStarted {
        episode,
        url: url.to_string(),
        position,
        total,
    });

    let request = DownloadRequest {
        url,
        file_stem: &file_stem,
        directory,
        user_agent,
    };

    let start = Instant::now();
    let result = downloader.download(&request);
    let elapsed = start.elapsed();

    match result {
        Ok(file) => {
            tracing::info!(
                %episode,
                bytes = file.bytes,
                elapsed_secs = elapsed.as_secs_f64(),
                path = %file.path.display(),
                "Download finished"
            );
            progress_callback(ProgressEvent::DownloadFinished {
                episode,
                position,
                total,
                elapsed,
                bytes: file.bytes,
            });
            EpisodeAttempt {
                episode,
                elapsed,
                bytes: Some(file.bytes),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(%episode, error = %e, "Download failed, moving on");
            progress_callback(ProgressEvent::DownloadFailed {
                episode,
                error: e.to_string(),
            });
            EpisodeAttempt {
                episode,
                elapsed,
                bytes: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDownloader {
        fail: bool,
    }

    impl VideoDownloader for FixedDownloader {
        fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile, VideoDownloadError> {
            if self.fail {
                return Err(VideoDownloadError::NoVideoSource(request.url.to_string()));
            }
            Ok(DownloadedFile {
                path: request
                    .directory
                    .join(format!("{}.{}", request.file_stem, self.extension())),
                bytes: 42,
            })
        }
    }

    #[test]
    fn test_successful_attempt_reports_events() {
        let mut events = Vec::new();
        let attempt = download_episode(
            &FixedDownloader { fail: false },
            EpisodeId::new(1, 2),
            "https://example.com/ep2",
            Path::new("Show/S1"),
            "agent",
            (2, 5),
            &mut |event| events.push(event),
        );

        assert!(attempt.succeeded());
        assert_eq!(attempt.bytes, Some(42));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ProgressEvent::DownloadStarted { position: 2, total: 5, .. }
        ));
        assert!(matches!(
            events[1],
            ProgressEvent::DownloadFinished { bytes: 42, .. }
        ));
    }

    #[test]
    fn test_failed_attempt_is_not_propagated() {
        let mut events = Vec::new();
        let attempt = download_episode(
            &FixedDownloader { fail: true },
            EpisodeId::new(3, 1),
            "https://example.com/ep1",
            Path::new("Show/S3"),
            "agent",
            (1, 1),
            &mut |event| events.push(event),
        );

        assert!(!attempt.succeeded());
        assert!(attempt.bytes.is_none());
        assert!(attempt.error.unwrap().contains("https://example.com/ep1"));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::DownloadFailed { episode, .. }) if *episode == EpisodeId::new(3, 1)
        ));
    }

    #[test]
    fn test_default_extension() {
        assert_eq!(FixedDownloader { fail: false }.extension(), "mp4");
    }
}
