//! Download progress tracking.
//!
//! Progress is never written to a manifest. The presence of an episode file
//! under its canonical name is the only record that it is done, which makes
//! every run resumable. This module defines the canonical episode naming and
//! the `ProgressStore` trait with a directory-backed and an in-memory
//! implementation.
mod directory;
mod memory;

pub use directory::DirectoryProgressStore;
pub use memory::MemoryProgressStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or preparing download progress
#[derive(Debug, Error)]
pub enum ProgressStoreError {
    /// Failed to create a season output directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to list a season output directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read a directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),
}

/// Identifies a single episode by season and position within the season
///
/// Its `Display` form (`S1E05`) doubles as the file stem of the downloaded
/// episode and as the label used in missing-episode reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeId {
    pub season: u32,
    pub index: u32,
}

impl EpisodeId {
    pub fn new(season: u32, index: u32) -> Self {
        Self { season, index }
    }

    /// The canonical file name of this episode for the given extension
    pub fn file_name(&self, extension: &str) -> String {
        format!("{self}.{extension}")
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}E{:02}", self.season, self.index)
    }
}

/// Directory name of a season below the series directory (`S2`)
pub fn season_dir_name(season: u32) -> String {
    format!("S{season}")
}

/// Tracks which episodes of which season are already complete
///
/// Implementors only have to answer three questions: which indices of a
/// season are done, where the season's files go, and how to record a newly
/// finished episode.
pub trait ProgressStore {
    /// Returns the sorted set of episode indices of a season that are done
    fn list_done(&self, season: u32) -> Result<BTreeSet<u32>, ProgressStoreError>;

    /// Records a successfully downloaded episode
    fn mark_done(&mut self, episode: EpisodeId) -> Result<(), ProgressStoreError>;

    /// The directory episode files of a season are written to
    fn season_dir(&self, season: u32) -> PathBuf;

    /// Makes sure the season directory exists and returns it
    fn prepare_season(&mut self, season: u32) -> Result<PathBuf, ProgressStoreError>;

    /// Returns true if the episode is done
    fn is_done(&self, episode: EpisodeId) -> Result<bool, ProgressStoreError> {
        Ok(self.list_done(episode.season)?.contains(&episode.index))
    }
}

/// The next index to attempt when continuing after the highest finished one
///
/// Returns `max(present) + 1`, or 1 if nothing is present yet. Gaps below the
/// maximum are not considered; use [`missing_indices`] for that.
pub fn next_after(present: &BTreeSet<u32>) -> u32 {
    present.last().map_or(1, |max| max + 1)
}

/// The indices in `1..=total` that are not present, sorted ascending
pub fn missing_indices(total: u32, present: &BTreeSet<u32>) -> Vec<u32> {
    (1..=total).filter(|index| !present.contains(index)).collect()
}
