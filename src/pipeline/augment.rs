//! Entity augmentation: local tagging ahead of the extraction call.

use crate::models::{Article, AugmentedArticle, NlpEntities};
use crate::nlp::EntityTagger;
use tracing::{debug, warn};

/// Attach tagger entities to one article.
///
/// Never fails: when the tagger errors, the article gets empty entities
/// and a warning is logged.
pub fn augment<'a, T: EntityTagger>(tagger: &T, article: &'a Article) -> AugmentedArticle<'a> {
    let entities = match tagger.extract(&article.text_for_analysis()) {
        Ok(entities) => {
            debug!(
                title = %article.title,
                locations = ?entities.locations,
                dates = ?entities.dates,
                events = ?entities.events,
                "Tagged article"
            );
            entities
        }
        Err(e) => {
            warn!(title = %article.title, error = %e, "Entity tagging failed; continuing without entities");
            NlpEntities::default()
        }
    };
    AugmentedArticle { article, entities }
}

/// [`augment`] every article, keeping order.
pub fn augment_all<'a, T: EntityTagger>(
    tagger: &T,
    articles: &[&'a Article],
) -> Vec<AugmentedArticle<'a>> {
    articles.iter().map(|article| augment(tagger, article)).collect()
}
