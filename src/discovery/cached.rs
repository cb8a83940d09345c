//! Cached episode discovery
//!
//! Wraps another discovery and keeps its results on disk, so that resuming
//! an interrupted run does not have to read the series page again.

use super::{DiscoveredSeries, DiscoveryError, EpisodeDiscovery};
use crate::cache::{CacheError, CacheStorage};
use std::time::Duration;

/// A caching wrapper for episode discovery
///
/// Cache failures never fail the discovery: a broken or unreadable entry is
/// treated like a cache miss and a failed write is only logged.
pub struct CachedEpisodeDiscovery<D>
where
    D: EpisodeDiscovery,
{
    /// The underlying discovery
    discovery: D,
    /// Cache storage for discovered series
    cache: CacheStorage<DiscoveredSeries>,
    /// User agent of this run, replacing the one stored with a cache entry
    user_agent: String,
}

impl<D> CachedEpisodeDiscovery<D>
where
    D: EpisodeDiscovery,
{
    pub(crate) fn new(
        discovery: D,
        cache: CacheStorage<DiscoveredSeries>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            cache,
            user_agent: user_agent.into(),
        }
    }

    /// Wraps `discovery` with the persistent episode cache, whose entries
    /// expire after `ttl`
    ///
    /// `user_agent` must be the one `discovery` sends, since downloads reuse
    /// the user agent of the discovered series.
    pub fn open(discovery: D, user_agent: impl Into<String>, ttl: Duration) -> Result<Self, CacheError> {
        let cache = CacheStorage::open("episodes", Some(ttl))?;
        Ok(Self::new(discovery, cache, user_agent))
    }
}

impl<D> EpisodeDiscovery for CachedEpisodeDiscovery<D>
where
    D: EpisodeDiscovery,
{
    fn fetch_episodes(&self, page_url: &str) -> Result<DiscoveredSeries, DiscoveryError> {
        match self.cache.load(page_url) {
            Ok(Some(mut series)) => {
                tracing::debug!(page_url, "Using cached episode list");
                series.user_agent = self.user_agent.clone();
                return Ok(series);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(page_url, error = %e, "Ignoring unreadable cache entry");
            }
        }

        let series = self.discovery.fetch_episodes(page_url)?;

        if let Err(e) = self.cache.store(page_url, &series) {
            tracing::warn!(page_url, error = %e, "Failed to cache episode list");
        }

        Ok(series)
    }
}
