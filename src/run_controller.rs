//! Run controller module
//!
//! Validates the requested season range against the seasons a series
//! actually has, then processes the seasons one after another and collects
//! every episode that could not be downloaded.

use crate::ProgressEvent;
use crate::partition::{EpisodeList, SeasonOneRule, partition};
use crate::progress_store::{EpisodeId, ProgressStore, ProgressStoreError};
use crate::season_detection::SeasonSet;
use crate::season_processor::{
    ReconciliationDecision, ReconciliationRequest, SeasonJob, SeasonProcessor, SeasonReport,
};
use crate::video_download::VideoDownloader;
use std::fmt;
use thiserror::Error;

/// Errors that make a season range unusable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// No seasons were detected, so no range can be valid
    #[error("No seasons available")]
    EmptySeasonSet,

    /// The range is inverted
    #[error("Ending season {end} cannot be less than the starting season {start}")]
    InvalidRange { start: u32, end: u32 },
}

/// A correction applied to a requested season range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAdjustment {
    /// The ending season was above the last available season
    EndClamped { requested: u32, clamped: u32 },
    /// The starting season was below the first available season
    StartClamped { requested: u32, clamped: u32 },
}

impl fmt::Display for RangeAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeAdjustment::EndClamped { requested, clamped } => write!(
                f,
                "Ending season cannot be more than {clamped} (requested {requested}). Setting ending season to {clamped}."
            ),
            RangeAdjustment::StartClamped { requested, clamped } => write!(
                f,
                "Starting season cannot be less than {clamped} (requested {requested}). Setting starting season to {clamped}."
            ),
        }
    }
}

/// A validated, inclusive range of seasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonRange {
    pub start: u32,
    pub end: u32,
    /// Corrections made to the requested range, in the order applied
    pub adjustments: Vec<RangeAdjustment>,
}

/// Validates a requested season range against the available seasons
///
/// The checks run in a fixed order: an ending season past the last season is
/// clamped first, then an inverted range is rejected, and finally a starting
/// season before the first season is clamped. Clamping is reported through
/// [`SeasonRange::adjustments`]; an inverted range is fatal.
pub fn validate_range(
    seasons: &SeasonSet,
    requested_start: u32,
    requested_end: u32,
) -> Result<SeasonRange, RangeError> {
    let (Some(first), Some(last)) = (seasons.first(), seasons.last()) else {
        return Err(RangeError::EmptySeasonSet);
    };

    let mut start = requested_start;
    let mut end = requested_end;
    let mut adjustments = Vec::new();

    if end > last {
        tracing::warn!(requested = end, clamped = last, "Clamping ending season");
        adjustments.push(RangeAdjustment::EndClamped {
            requested: end,
            clamped: last,
        });
        end = last;
    }

    if end < start {
        return Err(RangeError::InvalidRange { start, end });
    }

    if start < first {
        tracing::warn!(requested = start, clamped = first, "Clamping starting season");
        adjustments.push(RangeAdjustment::StartClamped {
            requested: start,
            clamped: first,
        });
        start = first;
    }

    Ok(SeasonRange {
        start,
        end,
        adjustments,
    })
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Reports of the processed seasons, in order
    pub seasons: Vec<SeasonReport>,
    /// Seasons within the range that the series does not have
    pub skipped_seasons: Vec<u32>,
    /// Every episode still missing, across all processed seasons
    pub missing: Vec<EpisodeId>,
}

impl RunReport {
    /// True if every episode of every processed season is on disk
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Canonical labels of all missing episodes
    pub fn missing_labels(&self) -> Vec<String> {
        self.missing.iter().map(ToString::to_string).collect()
    }
}

/// Drives the season processor across a season range
pub struct RunController<'a> {
    episodes: &'a EpisodeList,
    seasons: &'a SeasonSet,
    rule: SeasonOneRule,
    user_agent: &'a str,
}

impl<'a> RunController<'a> {
    pub fn new(
        episodes: &'a EpisodeList,
        seasons: &'a SeasonSet,
        rule: SeasonOneRule,
        user_agent: &'a str,
    ) -> Self {
        Self {
            episodes,
            seasons,
            rule,
            user_agent,
        }
    }

    /// Processes every available season in the range, strictly in order
    ///
    /// A season's directory is created before any of its episodes is
    /// attempted. Per-episode failures end up in [`RunReport::missing`];
    /// only progress store failures abort the run.
    pub fn run<D, S, R, F>(
        &self,
        range: &SeasonRange,
        downloader: &D,
        store: &mut S,
        mut decide: R,
        mut progress_callback: F,
    ) -> Result<RunReport, ProgressStoreError>
    where
        D: VideoDownloader + ?Sized,
        S: ProgressStore,
        R: FnMut(&ReconciliationRequest) -> ReconciliationDecision,
        F: FnMut(ProgressEvent),
    {
        let mut report = RunReport::default();

        for season in range.start..=range.end {
            if !self.seasons.contains(season) {
                tracing::info!(season, "Season not available, skipping");
                progress_callback(ProgressEvent::SeasonSkipped { season });
                report.skipped_seasons.push(season);
                continue;
            }

            let directory = store.prepare_season(season)?;
            let episodes = partition(self.episodes, season, self.rule);

            let job = SeasonJob {
                season,
                episodes: &episodes,
                directory: &directory,
                user_agent: self.user_agent,
            };

            let season_report = SeasonProcessor::new(downloader, &mut *store).process(
                &job,
                &mut decide,
                &mut progress_callback,
            )?;

            report.missing.extend(season_report.still_missing.iter().copied());
            report.seasons.push(season_report);
        }

        progress_callback(ProgressEvent::Complete {
            seasons: report.seasons.len(),
            missing: report.missing.clone(),
        });

        Ok(report)
    }
}
