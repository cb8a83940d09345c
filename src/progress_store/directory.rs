//! Directory-backed progress store
//!
//! Derives download progress by listing a season directory and parsing the
//! canonical episode file names found there.

use super::{EpisodeId, ProgressStore, ProgressStoreError, season_dir_name};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// File extensions that count as a finished video download
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "m4v"];

/// Canonical episode file name: `S<season>E<index>.<ext>`, with the index
/// padded to at least two digits
static EPISODE_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^S([1-9]\d*)E(\d{2,})\.([A-Za-z0-9]+)$").expect("episode file name pattern is valid")
});

/// Progress store that treats the series directory as the source of truth
///
/// Episodes of season `N` live in `<series_dir>/S<N>/`.
#[derive(Debug, Clone)]
pub struct DirectoryProgressStore {
    /// Root directory of the series
    series_dir: PathBuf,
}

impl DirectoryProgressStore {
    /// Creates a store rooted at the given series directory
    ///
    /// Nothing is created on disk until a season is prepared.
    pub fn new(series_dir: impl Into<PathBuf>) -> Self {
        Self {
            series_dir: series_dir.into(),
        }
    }
}

impl ProgressStore for DirectoryProgressStore {
    fn list_done(&self, season: u32) -> Result<BTreeSet<u32>, ProgressStoreError> {
        scan_season_dir(&self.season_dir(season), season)
    }

    fn mark_done(&mut self, _episode: EpisodeId) -> Result<(), ProgressStoreError> {
        // The downloaded file itself is the record
        Ok(())
    }

    fn season_dir(&self, season: u32) -> PathBuf {
        self.series_dir.join(season_dir_name(season))
    }

    fn prepare_season(&mut self, season: u32) -> Result<PathBuf, ProgressStoreError> {
        let dir = self.season_dir(season);

        if !dir.is_dir() {
            tracing::info!(season, path = %dir.display(), "Creating season directory");
            fs::create_dir_all(&dir).map_err(|e| ProgressStoreError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;
        }

        Ok(dir)
    }
}

/// Lists the episode indices of a season found in a directory
///
/// A directory that does not exist yet simply has no episodes.
pub(crate) fn scan_season_dir(dir: &Path, season: u32) -> Result<BTreeSet<u32>, ProgressStoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => {
            return Err(ProgressStoreError::ReadDirectoryFailed {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut indices = BTreeSet::new();

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(index) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| parse_episode_file_name(name, season))
        {
            indices.insert(index);
        }
    }

    Ok(indices)
}

/// Extracts the episode index from a canonical episode file name
///
/// Returns `None` for files of other seasons, unknown extensions and
/// anything that does not follow the canonical pattern (partial downloads
/// included).
fn parse_episode_file_name(file_name: &str, season: u32) -> Option<u32> {
    let caps = EPISODE_FILE_NAME.captures(file_name)?;

    let extension = caps[3].to_ascii_lowercase();
    if !VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let file_season: u32 = caps[1].parse().ok()?;
    if file_season != season {
        return None;
    }

    let index: u32 = caps[2].parse().ok()?;

    // `S1E005` parses to the same index but is not what the downloader writes
    if index == 0 || format!("{index:02}") != caps[2] {
        return None;
    }

    Some(index)
}
