//! In-memory progress store
//!
//! Keeps finished episodes in a map instead of on disk. Useful for dry runs
//! and for exercising the download orchestration without a filesystem.

use super::{EpisodeId, ProgressStore, ProgressStoreError, season_dir_name};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Progress store backed by a map of season to finished indices
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    /// Nominal series directory handed out as download target
    series_dir: PathBuf,
    done: BTreeMap<u32, BTreeSet<u32>>,
}

impl MemoryProgressStore {
    /// Creates an empty store reporting the given nominal series directory
    pub fn new(series_dir: impl Into<PathBuf>) -> Self {
        Self {
            series_dir: series_dir.into(),
            done: BTreeMap::new(),
        }
    }

    /// Creates a store that already knows some finished episodes
    pub fn with_done(series_dir: impl Into<PathBuf>, episodes: impl IntoIterator<Item = EpisodeId>) -> Self {
        let mut store = Self::new(series_dir);
        for episode in episodes {
            store
                .done
                .entry(episode.season)
                .or_default()
                .insert(episode.index);
        }
        store
    }
}

impl ProgressStore for MemoryProgressStore {
    fn list_done(&self, season: u32) -> Result<BTreeSet<u32>, ProgressStoreError> {
        Ok(self.done.get(&season).cloned().unwrap_or_default())
    }

    fn mark_done(&mut self, episode: EpisodeId) -> Result<(), ProgressStoreError> {
        self.done
            .entry(episode.season)
            .or_default()
            .insert(episode.index);
        Ok(())
    }

    fn season_dir(&self, season: u32) -> PathBuf {
        self.series_dir.join(season_dir_name(season))
    }

    fn prepare_season(&mut self, season: u32) -> Result<PathBuf, ProgressStoreError> {
        self.done.entry(season).or_default();
        Ok(self.season_dir(season))
    }
}
