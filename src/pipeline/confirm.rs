//! Confirmation: the extraction's own relevance flag is the final word.

use crate::error::StructuredError;
use crate::models::{Article, ConfirmedEvent};
use crate::schema::DisasterEvent;
use tracing::{info, instrument};

/// Pair each extracted event with its article and keep the confirmed ones.
///
/// `events` and `articles` are parallel. Failed extractions and events
/// with `is_disaster_related == false` are dropped; order is kept.
#[instrument(level = "info", skip_all, fields(count = events.len()))]
pub fn confirm(
    events: Vec<Result<DisasterEvent, StructuredError>>,
    articles: &[&Article],
) -> Vec<ConfirmedEvent> {
    debug_assert_eq!(events.len(), articles.len());

    let confirmed: Vec<ConfirmedEvent> = events
        .into_iter()
        .zip(articles)
        .filter_map(|(event, article)| {
            let event = event.ok()?;
            if !event.is_disaster_related {
                info!(title = %article.title, "Discarding false positive after detailed analysis");
                return None;
            }
            Some(ConfirmedEvent {
                event,
                article: (*article).clone(),
            })
        })
        .collect();

    info!(confirmed = confirmed.len(), "Confirmation complete");
    confirmed
}
