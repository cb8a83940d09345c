//! wcofun-cli - Download a cartoon series season by season
//!
//! This library discovers the episode list of a series page, sorts the
//! episodes into seasons and downloads them into a directory tree. Progress
//! lives entirely on disk, so an interrupted run picks up where it left off.

mod cache;
mod config;
mod discovery;
mod partition;
mod progress_store;
mod run_controller;
mod season_detection;
mod season_processor;
mod temp;
#[cfg(test)]
mod test_support;
mod video_download;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// Re-export error types
pub use cache::CacheError;
pub use discovery::DiscoveryError;
pub use progress_store::ProgressStoreError;
pub use run_controller::RangeError;
pub use video_download::VideoDownloadError;

pub use config::{DEFAULT_TIMEOUT, DownloadOptions, EPISODE_CACHE_TTL};
pub use discovery::{
    CachedEpisodeDiscovery, DEFAULT_USER_AGENT, DiscoveredSeries, EpisodeDiscovery,
    HtmlEpisodeDiscovery, sanitize_title_name,
};
pub use partition::{EpisodeLink, EpisodeList, SeasonEpisode, SeasonOneRule, partition};
pub use progress_store::{
    DirectoryProgressStore, EpisodeId, MemoryProgressStore, ProgressStore, missing_indices,
    next_after, season_dir_name,
};
pub use run_controller::{RangeAdjustment, RunController, RunReport, SeasonRange, validate_range};
pub use season_detection::{SeasonSet, detect_seasons};
pub use season_processor::{
    ReconciliationDecision, ReconciliationRequest, SeasonJob, SeasonProcessor, SeasonReport,
};
pub use video_download::{
    DownloadRequest, DownloadedFile, EpisodeAttempt, HttpVideoDownloader, VideoDownloader,
    download_episode,
};

/// Progress event emitted while discovering and downloading a series
///
/// These events allow library users to track progress and provide feedback
/// during a run, or to stay silent.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Reading the series page
    FetchingEpisodes { url: String },

    /// Series page read successfully
    EpisodesFetched {
        title_name: String,
        episode_count: usize,
        seasons: SeasonSet,
    },

    /// A season within the requested range does not exist
    SeasonSkipped { season: u32 },

    /// Starting on a season
    SeasonStarted {
        season: u32,
        episode_count: u32,
        directory: PathBuf,
    },

    /// Episode already on disk, no download needed
    EpisodeSkipped { episode: EpisodeId },

    /// Download of an episode started
    DownloadStarted {
        episode: EpisodeId,
        url: String,
        position: u32,
        total: u32,
    },

    /// Episode downloaded completely
    DownloadFinished {
        episode: EpisodeId,
        position: u32,
        total: u32,
        elapsed: Duration,
        bytes: u64,
    },

    /// Episode download failed, the run carries on
    DownloadFailed { episode: EpisodeId, error: String },

    /// Episodes are missing after the initial pass of a season
    GapsFound { season: u32, missing: Vec<EpisodeId> },

    /// The missing episodes of a season are left alone
    RetryDeclined { season: u32 },

    /// A season is finished
    SeasonComplete {
        season: u32,
        still_missing: Vec<EpisodeId>,
    },

    /// All seasons of the range are processed
    Complete {
        seasons: usize,
        missing: Vec<EpisodeId>,
    },
}

/// Top-level error type for a download run
#[derive(Debug, Error)]
pub enum SeriesDownloadError {
    /// Error while discovering the episodes
    #[error("Failed to fetch episode links or detect seasons: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The requested season range is unusable
    #[error("Invalid season range: {0}")]
    Range(#[from] RangeError),

    /// Error while reading or preparing the output directories
    #[error("Output directory error: {0}")]
    ProgressStore(#[from] ProgressStoreError),

    /// Error while setting up the video downloader
    #[error("Video download error: {0}")]
    VideoDownload(#[from] VideoDownloadError),

    /// Error while setting up the episode cache
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Builds the discovery collaborator described by the options
///
/// The HTML discovery is wrapped in the episode cache unless caching is
/// disabled.
pub fn build_discovery(
    options: &DownloadOptions,
) -> Result<Box<dyn EpisodeDiscovery>, SeriesDownloadError> {
    let html = HtmlEpisodeDiscovery::new(options.user_agent.clone(), options.timeout)?;

    if !options.use_cache {
        return Ok(Box::new(html));
    }

    Ok(Box::new(CachedEpisodeDiscovery::open(
        html,
        options.user_agent.clone(),
        EPISODE_CACHE_TTL,
    )?))
}

/// Builds the HTTP downloader described by the options
pub fn build_downloader(options: &DownloadOptions) -> Result<HttpVideoDownloader, SeriesDownloadError> {
    Ok(HttpVideoDownloader::new(options.timeout)?)
}

/// Discovers the episodes and seasons of the series behind `page_url`
///
/// Fails if the page cannot be read or yields no seasons at all, since no
/// season range could be validated against an empty set.
pub fn discover_series<F>(
    discovery: &dyn EpisodeDiscovery,
    page_url: &str,
    mut progress_callback: F,
) -> Result<DiscoveredSeries, SeriesDownloadError>
where
    F: FnMut(ProgressEvent),
{
    progress_callback(ProgressEvent::FetchingEpisodes {
        url: page_url.to_string(),
    });

    let series = discovery.fetch_episodes(page_url)?;

    if series.seasons.is_empty() {
        return Err(RangeError::EmptySeasonSet.into());
    }

    tracing::info!(
        title = %series.title_name,
        episodes = series.episodes.len(),
        seasons = %series.seasons,
        "Discovered series"
    );
    progress_callback(ProgressEvent::EpisodesFetched {
        title_name: series.title_name.clone(),
        episode_count: series.episodes.len(),
        seasons: series.seasons.clone(),
    });

    Ok(series)
}

/// Downloads the seasons of a discovered series within a validated range
///
/// Episodes are written to `<output_dir>/<title_name>/S<season>/`, and
/// whatever is already there is not downloaded again. `decide` is asked once
/// per season with missing episodes whether they should be retried.
///
/// # Examples
///
/// ```no_run
/// use wcofun_cli::{
///     DownloadOptions, ReconciliationDecision, build_discovery, build_downloader,
///     discover_series, download_seasons, validate_range,
/// };
///
/// let options = DownloadOptions::default();
/// let discovery = build_discovery(&options).unwrap();
/// let series = discover_series(discovery.as_ref(), "https://www.wcofun.net/anime/show", |_| {}).unwrap();
/// let range = validate_range(&series.seasons, 1, 2).unwrap();
/// let downloader = build_downloader(&options).unwrap();
///
/// let report = download_seasons(
///     &series,
///     &range,
///     &options,
///     &downloader,
///     |_| ReconciliationDecision::retry(),
///     |_| {},
/// )
/// .unwrap();
/// println!("Missing: {:?}", report.missing_labels());
/// ```
pub fn download_seasons<D, R, F>(
    series: &DiscoveredSeries,
    range: &SeasonRange,
    options: &DownloadOptions,
    downloader: &D,
    decide: R,
    progress_callback: F,
) -> Result<RunReport, SeriesDownloadError>
where
    D: VideoDownloader + ?Sized,
    R: FnMut(&ReconciliationRequest) -> ReconciliationDecision,
    F: FnMut(ProgressEvent),
{
    let episodes = series.episode_list();
    let mut store = DirectoryProgressStore::new(options.series_dir(&series.title_name));

    let controller = RunController::new(
        &episodes,
        &series.seasons,
        options.season_one_rule,
        &series.user_agent,
    );

    Ok(controller.run(range, downloader, &mut store, decide, progress_callback)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedDownloader;
    use tempfile::TempDir;

    struct StaticDiscovery(Option<DiscoveredSeries>);

    impl EpisodeDiscovery for StaticDiscovery {
        fn fetch_episodes(&self, page_url: &str) -> Result<DiscoveredSeries, DiscoveryError> {
            self.0
                .clone()
                .ok_or_else(|| DiscoveryError::StructureNotFound(page_url.to_string()))
        }
    }

    fn series() -> DiscoveredSeries {
        // Newest first, as the series page lists them
        let titles = ["Season 2 Ep2", "Season 2 Ep1", "Ep2", "Ep1"];
        DiscoveredSeries {
            title_name: "Show".to_string(),
            user_agent: "agent".to_string(),
            episodes: titles
                .iter()
                .map(|title| EpisodeLink {
                    link: format!("https://example.com/{}", title.replace(' ', "-")),
                    title: title.to_string(),
                })
                .collect(),
            seasons: detect_seasons(titles),
        }
    }

    #[test]
    fn test_discover_series_reports_events() {
        let discovery = StaticDiscovery(Some(series()));
        let mut events = Vec::new();

        let series = discover_series(&discovery, "https://example.com/show", |event| {
            events.push(event)
        })
        .unwrap();

        assert_eq!(series.title_name, "Show");
        assert!(matches!(events[0], ProgressEvent::FetchingEpisodes { .. }));
        assert!(matches!(
            &events[1],
            ProgressEvent::EpisodesFetched { episode_count: 4, seasons, .. } if seasons.len() == 2
        ));
    }

    #[test]
    fn test_discovery_failure_is_fatal() {
        let discovery = StaticDiscovery(None);
        let result = discover_series(&discovery, "https://example.com/show", |_| {});
        assert!(matches!(result, Err(SeriesDownloadError::Discovery(_))));
    }

    #[test]
    fn test_empty_season_set_is_fatal() {
        let mut series = series();
        series.seasons = SeasonSet::default();
        let discovery = StaticDiscovery(Some(series));

        let result = discover_series(&discovery, "https://example.com/show", |_| {});
        assert!(matches!(
            result,
            Err(SeriesDownloadError::Range(RangeError::EmptySeasonSet))
        ));
    }

    #[test]
    fn test_build_collaborators_from_defaults() {
        let options = DownloadOptions {
            use_cache: false,
            ..DownloadOptions::default()
        };
        assert!(build_discovery(&options).is_ok());
        assert!(build_downloader(&options).is_ok());
    }

    #[test]
    fn test_download_seasons_writes_directory_tree() {
        let temp = TempDir::new().unwrap();
        let options = DownloadOptions {
            output_dir: temp.path().to_path_buf(),
            ..DownloadOptions::default()
        };
        let series = series();
        let range = validate_range(&series.seasons, 1, 2).unwrap();
        let downloader = ScriptedDownloader::writing_files();

        let report = download_seasons(
            &series,
            &range,
            &options,
            &downloader,
            |_: &ReconciliationRequest| ReconciliationDecision::skip(),
            |_| {},
        )
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(downloader.calls(), vec!["S1E01", "S1E02", "S2E01", "S2E02"]);
        for path in ["Show/S1/S1E01.mp4", "Show/S1/S1E02.mp4", "Show/S2/S2E01.mp4", "Show/S2/S2E02.mp4"] {
            assert!(temp.path().join(path).is_file(), "{path} missing");
        }
    }
}
