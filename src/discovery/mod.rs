//! Episode discovery for a series page.
//!
//! This module provides the data structure describing a discovered series and
//! the trait for collaborators that extract it from a web page.
mod cached;
mod html;

pub use cached::CachedEpisodeDiscovery;
pub use html::{DEFAULT_USER_AGENT, HtmlEpisodeDiscovery};

use crate::partition::{EpisodeLink, EpisodeList};
use crate::season_detection::SeasonSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters that are not allowed in directory names on common platforms
const UNSAFE_PATH_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Errors that can occur while discovering the episodes of a series.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The page URL could not be parsed
    #[error("Invalid page URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Failed to set up the HTTP client
    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(reqwest::Error),

    /// Request to the series page failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The series page answered with a non-success status
    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The page does not have the expected structure
    #[error("Page structure not found: {0}")]
    StructureNotFound(String),

    /// The page lists no episodes
    #[error("No episodes found at {0}")]
    NoEpisodes(String),

    /// The series title could not be determined
    #[error("Series title not found at {0}")]
    MissingTitle(String),
}

/// Everything known about a series after reading its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredSeries {
    /// Series name, already stripped of filesystem-unsafe characters
    pub title_name: String,
    /// User agent the page was fetched with, reused for the downloads
    pub user_agent: String,
    /// Episode links and titles in page order (newest first)
    pub episodes: Vec<EpisodeLink>,
    /// Seasons detected from the episode titles
    pub seasons: SeasonSet,
}

impl DiscoveredSeries {
    /// The episodes in playback order (oldest first)
    pub fn episode_list(&self) -> EpisodeList {
        EpisodeList::from_newest_first(self.episodes.clone())
    }
}

/// Trait for collaborators that discover the episodes of a series.
///
/// Implementors return the episodes in the order the page lists them, which
/// is newest first. Reordering into playback order happens exactly once, in
/// [`DiscoveredSeries::episode_list`].
pub trait EpisodeDiscovery {
    /// Fetches the episode list of the series behind `page_url`.
    fn fetch_episodes(&self, page_url: &str) -> Result<DiscoveredSeries, DiscoveryError>;
}

/// Removes characters that cannot appear in a directory name
///
/// Leading and trailing whitespace is trimmed as well.
pub fn sanitize_title_name(name: &str) -> String {
    name.chars()
        .filter(|c| !UNSAFE_PATH_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title_name() {
        assert_eq!(sanitize_title_name("Normal Title"), "Normal Title");
        assert_eq!(sanitize_title_name("Title: With Colon"), "Title With Colon");
        assert_eq!(sanitize_title_name("What?! <Really> \"Yes\""), "What! Really Yes");
        assert_eq!(sanitize_title_name("Path/With\\Slashes|Pipe*"), "PathWithSlashesPipe");
        assert_eq!(sanitize_title_name("  Spaces  "), "Spaces");
    }

    #[test]
    fn test_episode_list_is_playback_order() {
        let series = DiscoveredSeries {
            title_name: "Show".to_string(),
            user_agent: "agent".to_string(),
            episodes: vec![
                EpisodeLink {
                    link: "https://example.com/2".to_string(),
                    title: "Episode 2".to_string(),
                },
                EpisodeLink {
                    link: "https://example.com/1".to_string(),
                    title: "Episode 1".to_string(),
                },
            ],
            seasons: [1].into_iter().collect(),
        };

        let list = series.episode_list();
        assert_eq!(list.titles().collect::<Vec<_>>(), vec!["Episode 1", "Episode 2"]);
        // The discovered order itself is left untouched
        assert_eq!(series.episodes[0].title, "Episode 2");
    }
}
