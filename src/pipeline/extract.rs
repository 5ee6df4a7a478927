//! Structured extraction: one schema-constrained call per relevant article.

use crate::api::{LanguageModel, extract};
use crate::config::FailurePolicy;
use crate::error::StructuredError;
use crate::models::AugmentedArticle;
use crate::pipeline::gather;
use crate::prompts;
use crate::schema::DisasterEvent;
use tracing::{debug, info, instrument};

/// Extract one [`DisasterEvent`] per input, in input order.
///
/// The returned vector is parallel to `inputs`. Under
/// [`FailurePolicy::FailClosed`] any failed item (backend error or schema
/// violation) fails the batch; under [`FailurePolicy::Isolate`] the failed
/// slots hold their error, and the batch fails only when every item failed.
#[instrument(level = "info", skip_all, fields(count = inputs.len(), concurrency = concurrency))]
pub async fn extract_events<L: LanguageModel>(
    llm: &L,
    inputs: &[AugmentedArticle<'_>],
    concurrency: usize,
    policy: FailurePolicy,
) -> Result<Vec<Result<DisasterEvent, StructuredError>>, StructuredError> {
    let events = gather("extract", inputs, concurrency, policy, |input| {
        let prompt = prompts::analyze_article(input);
        async move {
            let event = extract::<DisasterEvent, _>(llm, &prompt).await?;
            debug!(
                title = %input.article.title,
                is_disaster_related = event.is_disaster_related,
                disaster_type = ?event.disaster_type,
                confidence = event.confidence,
                "Extracted event"
            );
            Ok::<_, StructuredError>(event)
        }
    })
    .await?;

    info!(
        total = inputs.len(),
        extracted = events.iter().filter(|e| e.is_ok()).count(),
        "Detailed analysis complete"
    );
    Ok(events)
}
