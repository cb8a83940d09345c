/// HTML series page discovery.
use super::{DiscoveredSeries, DiscoveryError, EpisodeDiscovery, sanitize_title_name};
use crate::partition::EpisodeLink;
use crate::season_detection::detect_seasons;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use std::time::Duration;

/// User agent presented when none is configured
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Episode links live in the right-hand sidebar of a series page
const EPISODE_LINK_SELECTOR: &str = "#sidebar_right3 a";

/// Container the episode links are expected in
const SIDEBAR_SELECTOR: &str = "#sidebar_right3";

/// Selectors tried in order to find the series name
const TITLE_SELECTORS: &[&str] = &["h1 a", "h1"];

/// Discovers episodes by reading the static HTML of a series page.
///
/// The page is fetched once with the configured user agent, and the same
/// user agent is handed on for the episode downloads.
pub struct HtmlEpisodeDiscovery {
    client: Client,
    user_agent: String,
}

impl HtmlEpisodeDiscovery {
    /// Creates a discovery whose requests time out after `timeout`.
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DiscoveryError::ClientSetup)?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

impl EpisodeDiscovery for HtmlEpisodeDiscovery {
    fn fetch_episodes(&self, page_url: &str) -> Result<DiscoveredSeries, DiscoveryError> {
        let url = Url::parse(page_url).map_err(|e| DiscoveryError::InvalidUrl {
            url: page_url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(%url, "Fetching series page");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|e| DiscoveryError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::HttpStatus {
                url: page_url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .map_err(|e| DiscoveryError::RequestFailed(e.to_string()))?;

        parse_series_page(&body, &url, &self.user_agent)
    }
}

/// Extracts the series name and the episode links from a series page.
fn parse_series_page(
    html: &str,
    page_url: &Url,
    user_agent: &str,
) -> Result<DiscoveredSeries, DiscoveryError> {
    let document = Html::parse_document(html);

    let sidebar = selector(SIDEBAR_SELECTOR)?;
    if document.select(&sidebar).next().is_none() {
        return Err(DiscoveryError::StructureNotFound(format!(
            "no {} element at {}",
            SIDEBAR_SELECTOR, page_url
        )));
    }

    let link_selector = selector(EPISODE_LINK_SELECTOR)?;
    let episodes: Vec<EpisodeLink> = document
        .select(&link_selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let link = page_url.join(href.trim()).ok()?;
            let title = anchor.text().collect::<String>().trim().to_string();
            Some(EpisodeLink {
                link: link.to_string(),
                title,
            })
        })
        .collect();

    if episodes.is_empty() {
        return Err(DiscoveryError::NoEpisodes(page_url.to_string()));
    }

    let title_name = TITLE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|s| {
            document
                .select(&s)
                .map(|element| sanitize_title_name(&element.text().collect::<String>()))
                .find(|name| !name.is_empty())
        })
        .ok_or_else(|| DiscoveryError::MissingTitle(page_url.to_string()))?;

    let seasons = detect_seasons(episodes.iter().map(|e| e.title.as_str()));

    Ok(DiscoveredSeries {
        title_name,
        user_agent: user_agent.to_string(),
        episodes,
        seasons,
    })
}

fn selector(s: &str) -> Result<Selector, DiscoveryError> {
    Selector::parse(s).map_err(|e| DiscoveryError::StructureNotFound(e.to_string()))
}
