//! Season processing module
//!
//! Downloads all episodes of one season in two passes. The initial pass
//! attempts every episode that is not done yet. Afterwards the progress store
//! is consulted again to find the gaps, and the caller decides whether the
//! missing episodes get one more attempt.

use crate::ProgressEvent;
use crate::partition::SeasonEpisode;
use crate::progress_store::{EpisodeId, ProgressStore, ProgressStoreError, missing_indices};
use crate::video_download::{EpisodeAttempt, VideoDownloader, download_episode};
use std::path::Path;

/// One season's worth of work
#[derive(Debug, Clone, Copy)]
pub struct SeasonJob<'a> {
    pub season: u32,
    /// The season's episodes in playback order, indexed from 1
    pub episodes: &'a [SeasonEpisode],
    /// Directory the episode files are written to
    pub directory: &'a Path,
    pub user_agent: &'a str,
}

impl SeasonJob<'_> {
    /// Number of episodes the season is expected to have
    pub fn episode_count(&self) -> u32 {
        u32::try_from(self.episodes.len()).unwrap_or(u32::MAX)
    }

    fn episode(&self, index: u32) -> Option<&SeasonEpisode> {
        self.episodes.iter().find(|e| e.index == index)
    }
}

/// Episodes that are still missing after the initial pass
///
/// Handed to the caller, who answers with a [`ReconciliationDecision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub season: u32,
    /// Missing episodes, sorted ascending
    pub missing: Vec<EpisodeId>,
}

impl ReconciliationRequest {
    /// Canonical labels of the missing episodes (`S1E03`)
    pub fn labels(&self) -> Vec<String> {
        self.missing.iter().map(ToString::to_string).collect()
    }
}

/// Whether the missing episodes of a season get a second attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationDecision {
    pub retry: bool,
}

impl ReconciliationDecision {
    pub fn retry() -> Self {
        Self { retry: true }
    }

    pub fn skip() -> Self {
        Self { retry: false }
    }
}

/// Summary of a processed season
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonReport {
    pub season: u32,
    pub episode_count: u32,
    /// Download attempts made in both passes
    pub attempted: usize,
    /// Attempts that ended with a complete file
    pub succeeded: usize,
    /// Episodes found missing after the initial pass
    pub initially_missing: Vec<EpisodeId>,
    /// Whether the missing episodes were retried
    pub retried: bool,
    /// Episodes that are still missing when the season is done
    pub still_missing: Vec<EpisodeId>,
}

impl SeasonReport {
    pub fn is_complete(&self) -> bool {
        self.still_missing.is_empty()
    }
}

/// Drives the download passes of a season against a progress store
pub struct SeasonProcessor<'a, D: ?Sized, S> {
    downloader: &'a D,
    store: &'a mut S,
}

impl<'a, D, S> SeasonProcessor<'a, D, S>
where
    D: VideoDownloader + ?Sized,
    S: ProgressStore,
{
    pub fn new(downloader: &'a D, store: &'a mut S) -> Self {
        Self { downloader, store }
    }

    /// Processes a season from the initial pass to the final gap report
    ///
    /// `decide` is only consulted if episodes are missing after the initial
    /// pass. When a retry was made, the reported gaps are read back from the
    /// store, so they reflect what is actually on disk.
    pub fn process<R, F>(
        &mut self,
        job: &SeasonJob<'_>,
        mut decide: R,
        mut progress_callback: F,
    ) -> Result<SeasonReport, ProgressStoreError>
    where
        R: FnMut(&ReconciliationRequest) -> ReconciliationDecision,
        F: FnMut(ProgressEvent),
    {
        tracing::info!(
            season = job.season,
            episodes = job.episode_count(),
            "Processing season"
        );
        progress_callback(ProgressEvent::SeasonStarted {
            season: job.season,
            episode_count: job.episode_count(),
            directory: job.directory.to_path_buf(),
        });

        let mut attempts = self.initial_pass(job, &mut progress_callback)?;

        let Some(request) = self.find_gaps(job)? else {
            progress_callback(ProgressEvent::SeasonComplete {
                season: job.season,
                still_missing: Vec::new(),
            });
            return Ok(Self::report(job, attempts, Vec::new(), false, Vec::new()));
        };

        tracing::warn!(
            season = job.season,
            missing = %request.labels().join(", "),
            "Episodes missing after download"
        );
        progress_callback(ProgressEvent::GapsFound {
            season: job.season,
            missing: request.missing.clone(),
        });

        let decision = decide(&request);

        let still_missing = if decision.retry {
            attempts.extend(self.retry_missing(job, &request, &mut progress_callback)?);
            self.find_gaps(job)?
                .map(|remaining| remaining.missing)
                .unwrap_or_default()
        } else {
            tracing::info!(season = job.season, "Skipping missing episodes");
            progress_callback(ProgressEvent::RetryDeclined { season: job.season });
            request.missing.clone()
        };

        progress_callback(ProgressEvent::SeasonComplete {
            season: job.season,
            still_missing: still_missing.clone(),
        });

        Ok(Self::report(
            job,
            attempts,
            request.missing,
            decision.retry,
            still_missing,
        ))
    }

    /// Attempts every episode of the season that is not done yet
    ///
    /// Episodes already present are skipped without any network I/O and a
    /// failed download never stops the pass.
    pub fn initial_pass<F>(
        &mut self,
        job: &SeasonJob<'_>,
        progress_callback: &mut F,
    ) -> Result<Vec<EpisodeAttempt>, ProgressStoreError>
    where
        F: FnMut(ProgressEvent),
    {
        let done = self.store.list_done(job.season)?;
        let mut attempts = Vec::new();

        for episode in job.episodes {
            let id = EpisodeId::new(job.season, episode.index);

            if done.contains(&episode.index) {
                tracing::debug!(episode = %id, "Already downloaded, skipping");
                progress_callback(ProgressEvent::EpisodeSkipped { episode: id });
                continue;
            }

            attempts.push(self.attempt(job, episode, progress_callback)?);
        }

        Ok(attempts)
    }

    /// Compares the store against the expected episodes of the season
    ///
    /// Returns `None` if every episode is done. This also catches episodes
    /// that went missing before the initial pass began.
    pub fn find_gaps(
        &self,
        job: &SeasonJob<'_>,
    ) -> Result<Option<ReconciliationRequest>, ProgressStoreError> {
        let present = self.store.list_done(job.season)?;
        let missing: Vec<EpisodeId> = missing_indices(job.episode_count(), &present)
            .into_iter()
            .map(|index| EpisodeId::new(job.season, index))
            .collect();

        if missing.is_empty() {
            return Ok(None);
        }

        Ok(Some(ReconciliationRequest {
            season: job.season,
            missing,
        }))
    }

    /// Makes exactly one more attempt for every missing episode
    pub fn retry_missing<F>(
        &mut self,
        job: &SeasonJob<'_>,
        request: &ReconciliationRequest,
        progress_callback: &mut F,
    ) -> Result<Vec<EpisodeAttempt>, ProgressStoreError>
    where
        F: FnMut(ProgressEvent),
    {
        let mut attempts = Vec::new();

        for id in &request.missing {
            match job.episode(id.index) {
                Some(episode) => attempts.push(self.attempt(job, episode, progress_callback)?),
                None => tracing::warn!(episode = %id, "No link known for missing episode"),
            }
        }

        Ok(attempts)
    }

    fn attempt<F>(
        &mut self,
        job: &SeasonJob<'_>,
        episode: &SeasonEpisode,
        progress_callback: &mut F,
    ) -> Result<EpisodeAttempt, ProgressStoreError>
    where
        F: FnMut(ProgressEvent),
    {
        let id = EpisodeId::new(job.season, episode.index);

        let attempt = download_episode(
            self.downloader,
            id,
            &episode.link,
            job.directory,
            job.user_agent,
            (episode.index, job.episode_count()),
            progress_callback,
        );

        if attempt.succeeded() {
            self.store.mark_done(id)?;
        }

        Ok(attempt)
    }

    fn report(
        job: &SeasonJob<'_>,
        attempts: Vec<EpisodeAttempt>,
        initially_missing: Vec<EpisodeId>,
        retried: bool,
        still_missing: Vec<EpisodeId>,
    ) -> SeasonReport {
        SeasonReport {
            season: job.season,
            episode_count: job.episode_count(),
            attempted: attempts.len(),
            succeeded: attempts.iter().filter(|a| a.succeeded()).count(),
            initially_missing,
            retried,
            still_missing,
        }
    }
}
