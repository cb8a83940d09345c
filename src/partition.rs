//! Episode partitioning module
//!
//! Splits the flat, playback-ordered episode list of a series into seasons
//! and numbers the episodes within each season by their position.

use crate::season_detection::season_marker;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Matches the single-digit season markers that exclude a title from season 1
static HIGHER_SINGLE_DIGIT_SEASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Season [2-9]").expect("higher season pattern is valid")
});

/// A single link/title pair as found on the series page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    /// Absolute URL of the episode page
    pub link: String,
    /// Display title of the episode
    pub title: String,
}

/// The complete episode list of a series in playback order (oldest first)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeList {
    entries: Vec<EpisodeLink>,
}

impl EpisodeList {
    /// Builds the list from entries that are already in playback order
    pub fn from_playback_order(entries: Vec<EpisodeLink>) -> Self {
        Self { entries }
    }

    /// Builds the list from entries in the order the series page lists them
    /// (newest first), reversing them once into playback order
    pub fn from_newest_first(mut entries: Vec<EpisodeLink>) -> Self {
        entries.reverse();
        Self { entries }
    }

    /// All entries in playback order
    pub fn entries(&self) -> &[EpisodeLink] {
        &self.entries
    }

    /// Iterates the titles in playback order
    pub fn titles(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.title.as_str())
    }
}

/// Decides how titles are assigned to season 1
///
/// Titles without any season marker always end up in season 1. The rules
/// differ in how they treat titles that carry a marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeasonOneRule {
    /// Season 1 holds every title without a `Season 2` .. `Season 9` marker,
    /// and season N > 1 holds every title containing `Season N`.
    ///
    /// Known limitation: a `Season 10` title is also placed in season 1,
    /// since only single-digit markers are excluded.
    #[default]
    SingleDigit,

    /// The first marker of a title is parsed as a number and the title
    /// belongs to exactly that season (or season 1 if it has no marker).
    Strict,
}

impl SeasonOneRule {
    /// Returns true if a title belongs to the given season under this rule
    pub fn matches(self, title: &str, season: u32) -> bool {
        match self {
            SeasonOneRule::SingleDigit if season == 1 => {
                !HIGHER_SINGLE_DIGIT_SEASON.is_match(title)
            }
            SeasonOneRule::SingleDigit => title.contains(&format!("Season {season}")),
            SeasonOneRule::Strict => season_marker(title).unwrap_or(1) == season,
        }
    }
}

/// One episode of a season together with its position in that season
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonEpisode {
    /// 1-based position within the season
    pub index: u32,
    /// Episode page URL
    pub link: String,
    /// Display title
    pub title: String,
}

/// Projects the episode list onto a single season
///
/// The relative order of the episodes is preserved and the k-th matching
/// entry receives index k. Numbers embedded in the titles are ignored.
pub fn partition(list: &EpisodeList, season: u32, rule: SeasonOneRule) -> Vec<SeasonEpisode> {
    list.entries()
        .iter()
        .filter(|entry| rule.matches(&entry.title, season))
        .zip(1u32..)
        .map(|(entry, index)| SeasonEpisode {
            index,
            link: entry.link.clone(),
            title: entry.title.clone(),
        })
        .collect()
}
