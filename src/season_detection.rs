//! Season detection module
//!
//! This module infers which seasons a series has by looking for
//! `Season <N>` markers in the episode titles.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// Matches a season marker such as `Season 3` and captures the number
static SEASON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Season (\d+)").expect("season marker pattern is valid"));

/// The sorted, deduplicated set of season numbers of a series
///
/// Iteration always yields the seasons in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSet(BTreeSet<u32>);

impl SeasonSet {
    /// Returns true if the set contains no seasons at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of seasons in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the given season is part of the set
    pub fn contains(&self, season: u32) -> bool {
        self.0.contains(&season)
    }

    /// The lowest season number, if any
    pub fn first(&self) -> Option<u32> {
        self.0.first().copied()
    }

    /// The highest season number, if any
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Iterates the seasons in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for SeasonSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SeasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seasons: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", seasons.join(", "))
    }
}

/// Extracts the season number from the first `Season <N>` marker of a title
///
/// Returns `None` when the title carries no marker, when the number does not
/// fit into a `u32`, or when it is zero.
pub(crate) fn season_marker(title: &str) -> Option<u32> {
    SEASON_MARKER
        .captures(title)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|season| *season >= 1)
}

/// Detects the seasons present in a list of episode titles
///
/// Titles without a marker are assumed to belong to season 1, so season 1 is
/// always part of the result: either because no marker was found at all, or
/// because higher seasons were found and the unmarked episodes still need a
/// home.
///
/// # Examples
///
/// ```
/// use wcofun_cli::detect_seasons;
///
/// let seasons = detect_seasons(["Ep1", "Season 3 Ep1"]);
/// assert_eq!(seasons.iter().collect::<Vec<_>>(), vec![1, 3]);
/// ```
pub fn detect_seasons<I, S>(titles: I) -> SeasonSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seasons: BTreeSet<u32> = titles
        .into_iter()
        .filter_map(|title| season_marker(title.as_ref()))
        .collect();

    seasons.insert(1);

    SeasonSet(seasons)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seasons(titles: &[&str]) -> Vec<u32> {
        detect_seasons(titles.iter()).iter().collect()
    }

    #[test]
    fn test_no_markers_yields_season_one() {
        assert_eq!(seasons(&["Pilot", "The Return", "Finale"]), vec![1]);
        assert_eq!(seasons(&[]), vec![1]);
    }

    #[test]
    fn test_higher_seasons_imply_season_one() {
        assert_eq!(seasons(&["Season 2 Episode 1", "Season 4 Episode 1"]), vec![1, 2, 4]);
    }

    #[test]
    fn test_output_sorted_and_deduplicated() {
        let result = seasons(&[
            "Season 3 Episode 2",
            "Season 2 Episode 1",
            "Season 3 Episode 1",
            "Season 1 Episode 1",
            "Season 2 Episode 2",
        ]);
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_double_digit_seasons_accepted() {
        assert_eq!(seasons(&["Season 12 Episode 5"]), vec![1, 12]);
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        assert_eq!(seasons(&["season 2 episode 1", "SEASON 3"]), vec![1]);
    }

    #[test]
    fn test_season_marker_ignores_zero_and_overflow() {
        assert_eq!(season_marker("Season 0 Special"), None);
        assert_eq!(season_marker("Season 99999999999 Episode 1"), None);
        assert_eq!(season_marker("Season 7 Episode 1"), Some(7));
        assert_eq!(season_marker("Episode 1"), None);
    }

    #[test]
    fn test_display() {
        let set: SeasonSet = [3, 1, 2].into_iter().collect();
        assert_eq!(set.to_string(), "[1, 2, 3]");
        assert_eq!(set.first(), Some(1));
        assert_eq!(set.last(), Some(3));
        assert_eq!(set.len(), 3);
    }
}
