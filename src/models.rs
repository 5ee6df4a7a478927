//! Data models flowing between the pipeline stages.
//!
//! - [`Article`]: a fetched news item, immutable input to the pipeline
//! - [`NlpEntities`]: locations, dates and named events found by the tagger
//! - [`AugmentedArticle`]: an article plus its entities, input to extraction
//! - [`ConfirmedEvent`]: a confirmed [`DisasterEvent`] paired with its source

use crate::schema::DisasterEvent;
use serde::{Deserialize, Serialize};
use url::Url;

/// A single news item as returned by the news provider.
///
/// Identity is positional (index in the fetched sequence) plus `link`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// Headline.
    pub title: String,
    /// Link to the article.
    pub link: Url,
    /// Publication timestamp as reported by the feed (not parsed).
    pub published: String,
    /// Short plain-text summary.
    pub summary: String,
}

impl Article {
    /// Text handed to the entity tagger: `"{title}. {summary}"`.
    pub fn text_for_analysis(&self) -> String {
        format!("{}. {}", self.title, self.summary)
    }
}

/// Entities extracted from article text by the tagger.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NlpEntities {
    pub locations: Vec<String>,
    pub dates: Vec<String>,
    pub events: Vec<String>,
}

impl NlpEntities {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.dates.is_empty() && self.events.is_empty()
    }
}

/// The extraction-stage payload for one relevant article.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedArticle<'a> {
    pub article: &'a Article,
    pub entities: NlpEntities,
}

/// A confirmed disaster event and the article it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedEvent {
    pub event: DisasterEvent,
    pub article: Article,
}
