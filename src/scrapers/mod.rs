//! News sources the pipeline can pull articles from.
//!
//! Every source implements [`NewsProvider`]: given a search query, a
//! recency window and a result cap, it returns articles in the order the
//! source ranks them.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Google News | [`google_news`] | RSS search | Query plus `when:<period>` recency operator |
//!
//! The `period` grammar (`24h`, `7d`, ...) belongs to the source and is
//! passed through untouched.

pub mod google_news;

use crate::error::FetchError;
use crate::models::Article;

/// A searchable news source.
pub trait NewsProvider {
    /// Search for `query` within the last `period`, returning at most
    /// `max_results` articles in source order. An empty result is not an error.
    async fn fetch(
        &self,
        query: &str,
        period: &str,
        max_results: usize,
    ) -> Result<Vec<Article>, FetchError>;
}
