//! Run configuration

use crate::discovery::DEFAULT_USER_AGENT;
use crate::partition::SeasonOneRule;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for a single HTTP request, including the body transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How long a discovered episode list stays cached
pub const EPISODE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings shared by discovery and download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Directory the series directory is created in
    pub output_dir: PathBuf,
    /// User agent for all requests
    pub user_agent: String,
    /// Timeout for a single request
    pub timeout: Duration,
    /// How episode titles are assigned to season 1
    pub season_one_rule: SeasonOneRule,
    /// Whether discovered episode lists are cached between runs
    pub use_cache: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            season_one_rule: SeasonOneRule::default(),
            use_cache: true,
        }
    }
}

impl DownloadOptions {
    /// Directory holding all seasons of a series: `<output_dir>/<title_name>`
    pub fn series_dir(&self, title_name: &str) -> PathBuf {
        self.output_dir.join(title_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DownloadOptions::default();
        assert_eq!(options.output_dir, PathBuf::from("."));
        assert_eq!(options.season_one_rule, SeasonOneRule::SingleDigit);
        assert!(options.use_cache);
        assert_eq!(options.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_series_dir() {
        let options = DownloadOptions {
            output_dir: PathBuf::from("/downloads"),
            ..DownloadOptions::default()
        };
        assert_eq!(options.series_dir("My Show"), PathBuf::from("/downloads/My Show"));
    }
}
