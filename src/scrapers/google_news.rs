//! Google News RSS search.
//!
//! Searches go to the public RSS endpoint:
//!
//! ```text
//! https://news.google.com/rss/search?q=<query>+when:<period>&hl=<lang>-<country>&gl=<country>&ceid=<country>:<lang>
//! ```
//!
//! Item descriptions are small HTML fragments (a link to the story and the
//! outlet name); they are flattened to plain text for the summary.

use crate::config::Settings;
use crate::error::{ConfigError, FetchError};
use crate::models::Article;
use crate::scrapers::NewsProvider;
use crate::utils::collapse_whitespace;
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const SEARCH_URL: &str = "https://news.google.com/rss/search";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
    #[serde(default)]
    description: String,
}

/// Google News search for one language/country edition.
#[derive(Debug, Clone)]
pub struct GoogleNews {
    http_client: Client,
    language: String,
    country: String,
}

impl GoogleNews {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http_client,
            language: settings.news_language.clone(),
            country: settings.news_country.clone(),
        })
    }

    /// Build the search URL for `query` restricted to the last `period`.
    pub fn search_url(&self, query: &str, period: &str) -> Result<Url, FetchError> {
        let url = format!(
            "{SEARCH_URL}?q={}+when:{}&hl={lang}-{country}&gl={country}&ceid={country}:{lang}",
            urlencoding::encode(query),
            urlencoding::encode(period),
            lang = self.language,
            country = self.country,
        );
        Ok(Url::parse(&url)?)
    }
}

impl NewsProvider for GoogleNews {
    #[instrument(level = "info", skip(self))]
    async fn fetch(
        &self,
        query: &str,
        period: &str,
        max_results: usize,
    ) -> Result<Vec<Article>, FetchError> {
        let url = self.search_url(query, period)?;
        info!(%url, "Fetching news feed");

        let t0 = Instant::now();
        let response = self.http_client.get(url.clone()).send().await.map_err(|e| {
            error!(%url, error = %e, "News feed request failed");
            FetchError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(%url, %status, "News feed returned an error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis(), bytes = body.len(), "Downloaded news feed");

        let articles = parse_feed(&body, max_results).map_err(|e| {
            error!(error = %e, "News feed could not be decoded");
            e
        })?;
        info!(count = articles.len(), "Fetched news articles");
        Ok(articles)
    }
}

/// Decode an RSS document into at most `max_results` articles.
///
/// Items whose link is not an absolute URL are skipped.
pub fn parse_feed(xml: &str, max_results: usize) -> Result<Vec<Article>, FetchError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    let articles = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| match Url::parse(item.link.trim()) {
            Ok(link) => Some(Article {
                title: collapse_whitespace(&item.title),
                link,
                published: item.pub_date.trim().to_string(),
                summary: html_to_text(&item.description),
            }),
            Err(e) => {
                warn!(title = %item.title, link = %item.link, error = %e, "Skipping feed item with invalid link");
                None
            }
        })
        .take(max_results)
        .collect();
    Ok(articles)
}

/// Flatten an HTML fragment to whitespace-normalized text.
fn html_to_text(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}
