//! Relevance pre-filter: a cheap free-text call per article.

use crate::api::LanguageModel;
use crate::config::FailurePolicy;
use crate::error::BackendError;
use crate::models::Article;
use crate::pipeline::gather;
use crate::prompts;
use tracing::{debug, info, instrument};

/// The classifier's answer for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Relevant,
    Irrelevant,
}

/// Read a free-text answer. Negative forms win, so "irrelevant" and
/// "not relevant" never count as relevant; anything without the word is
/// irrelevant.
pub fn parse_verdict(answer: &str) -> Verdict {
    let answer = answer.to_lowercase();
    if answer.contains("irrelevant") || answer.contains("not relevant") {
        Verdict::Irrelevant
    } else if answer.contains("relevant") {
        Verdict::Relevant
    } else {
        Verdict::Irrelevant
    }
}

/// Keep the articles the model judges relevant, in input order.
///
/// Under [`FailurePolicy::FailClosed`] the first failed call fails the
/// whole batch; under [`FailurePolicy::Isolate`] failed articles are
/// dropped, and the batch fails only when no call succeeded.
#[instrument(level = "info", skip_all, fields(count = articles.len(), concurrency = concurrency))]
pub async fn classify_relevance<'a, L: LanguageModel>(
    llm: &L,
    articles: &'a [Article],
    concurrency: usize,
    policy: FailurePolicy,
) -> Result<Vec<&'a Article>, BackendError> {
    let verdicts = gather("classify", articles, concurrency, policy, |article| {
        let prompt = prompts::classify_relevance(article);
        async move {
            let answer = llm.complete(&prompt).await?;
            let verdict = parse_verdict(&answer);
            debug!(title = %article.title, answer = %answer.trim(), ?verdict, "Classified article");
            Ok::<_, BackendError>(verdict)
        }
    })
    .await?;

    let relevant: Vec<&Article> = verdicts
        .into_iter()
        .zip(articles)
        .filter_map(|(verdict, article)| matches!(verdict, Ok(Verdict::Relevant)).then_some(article))
        .collect();
    info!(
        total = articles.len(),
        relevant = relevant.len(),
        "Pre-filtering complete"
    );
    Ok(relevant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PromptBackend, article};

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("relevant"), Verdict::Relevant);
        assert_eq!(parse_verdict("Relevant."), Verdict::Relevant);
        assert_eq!(parse_verdict("  RELEVANT\n"), Verdict::Relevant);
        assert_eq!(parse_verdict("irrelevant"), Verdict::Irrelevant);
        assert_eq!(parse_verdict("Irrelevant."), Verdict::Irrelevant);
        assert_eq!(parse_verdict("This is not relevant"), Verdict::Irrelevant);
        assert_eq!(parse_verdict("yes"), Verdict::Irrelevant);
        assert_eq!(parse_verdict(""), Verdict::Irrelevant);
    }

    #[tokio::test]
    async fn test_keeps_relevant_articles_in_order() {
        let articles = vec![article("Flood a"), article("Budget b"), article("Flood c")];
        let backend = PromptBackend::new(
            |p| Ok((if p.contains("Flood") { "relevant" } else { "irrelevant" }).to_string()),
            |_| unreachable!("classification never extracts"),
        );
        let relevant = classify_relevance(&backend, &articles, 2, FailurePolicy::FailClosed)
            .await
            .unwrap();
        let titles: Vec<_> = relevant.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Flood a", "Flood c"]);
        assert_eq!(backend.classify_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let backend = PromptBackend::new(|_| Ok("relevant".into()), |_| unreachable!());
        let relevant = classify_relevance(&backend, &[], 10, FailurePolicy::FailClosed)
            .await
            .unwrap();
        assert!(relevant.is_empty());
        assert_eq!(backend.classify_calls(), 0);
    }

    #[tokio::test]
    async fn test_fail_closed_fails_the_batch() {
        let articles = vec![article("Flood a"), article("Flood b")];
        let backend = PromptBackend::new(
            |p| {
                if p.contains("Flood b") {
                    Err(BackendError::Auth(401))
                } else {
                    Ok("relevant".into())
                }
            },
            |_| unreachable!(),
        );
        let err = classify_relevance(&backend, &articles, 1, FailurePolicy::FailClosed)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Auth(401)));
    }

    #[tokio::test]
    async fn test_isolate_drops_only_failed_articles() {
        let articles = vec![article("Flood a"), article("Flood b"), article("Flood c")];
        let backend = PromptBackend::new(
            |p| {
                if p.contains("Flood b") {
                    Err(BackendError::Timeout)
                } else {
                    Ok("relevant".into())
                }
            },
            |_| unreachable!(),
        );
        let relevant = classify_relevance(&backend, &articles, 3, FailurePolicy::Isolate)
            .await
            .unwrap();
        let titles: Vec<_> = relevant.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Flood a", "Flood c"]);
    }

    #[tokio::test]
    async fn test_isolate_fails_when_every_call_fails() {
        let articles = vec![article("Flood a"), article("Flood b"), article("Flood c")];
        let backend = PromptBackend::new(|_| Err(BackendError::Auth(401)), |_| unreachable!());
        let err = classify_relevance(&backend, &articles, 3, FailurePolicy::Isolate)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Auth(401)));
        assert_eq!(backend.classify_calls(), 3);
    }

    #[tokio::test]
    async fn test_isolate_all_irrelevant_is_not_a_failure() {
        let articles = vec![article("Budget a"), article("Budget b")];
        let backend = PromptBackend::new(|_| Ok("irrelevant".into()), |_| unreachable!());
        let relevant = classify_relevance(&backend, &articles, 2, FailurePolicy::Isolate)
            .await
            .unwrap();
        assert!(relevant.is_empty());
    }
}
