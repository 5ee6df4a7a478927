//! The news analysis pipeline.
//!
//! ```text
//! provider ─▶ classify ─▶ augment ─▶ extract ─▶ confirm ─▶ caller
//! ```
//!
//! | Stage | Module | Backend call | Concurrency |
//! |-------|--------|--------------|-------------|
//! | Relevance pre-filter | [`classify`] | free text | `classify_concurrency` |
//! | Entity augmentation | [`augment`] | none (local tagger) | sequential |
//! | Structured extraction | [`extract`] | JSON schema | `extract_concurrency` |
//! | Confirmation & pairing | [`confirm`] | none | sequential |
//!
//! Every stage builds a new collection from the previous one. Backend calls
//! within a stage run through `buffer_unordered`; each call carries its
//! input index and results are sorted back into input order before they
//! are paired with articles.

pub mod augment;
pub mod classify;
pub mod confirm;
pub mod extract;

use crate::api::LanguageModel;
use crate::config::{FailurePolicy, Settings};
use crate::error::PipelineError;
use crate::models::ConfirmedEvent;
use crate::nlp::EntityTagger;
use crate::scrapers::NewsProvider;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt::Display;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Run `call` over `items` with at most `concurrency` calls in flight and
/// return the results in input order.
///
/// With [`FailurePolicy::FailClosed`] the first failure to complete is
/// returned and the calls still in flight are dropped. With
/// [`FailurePolicy::Isolate`] every call runs to completion and failures
/// stay in their slot, unless no call succeeded at all: then the first
/// failure in input order is returned.
pub(crate) async fn gather<'a, T, R, E, F, Fut>(
    stage: &'static str,
    items: &'a [T],
    concurrency: usize,
    policy: FailurePolicy,
    call: F,
) -> Result<Vec<Result<R, E>>, E>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Display,
{
    let calls = stream::iter(items.iter().enumerate())
        .map(|(index, item)| {
            let fut = call(item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(concurrency.max(1));

    match policy {
        FailurePolicy::FailClosed => {
            let mut done: Vec<(usize, R)> = calls
                .map(|(index, result)| result.map(|r| (index, r)).map_err(|e| (index, e)))
                .try_collect()
                .await
                .map_err(|(index, e)| {
                    error!(stage, index, error = %e, "Call failed; failing the batch");
                    e
                })?;
            done.sort_by_key(|(index, _)| *index);
            Ok(done.into_iter().map(|(_, r)| Ok(r)).collect())
        }
        FailurePolicy::Isolate => {
            let mut done: Vec<(usize, Result<R, E>)> = calls.collect().await;
            done.sort_by_key(|(index, _)| *index);
            for (index, result) in &done {
                if let Err(e) = result {
                    warn!(stage, index, error = %e, "Call failed; skipping item");
                }
            }
            let results: Vec<Result<R, E>> = done.into_iter().map(|(_, r)| r).collect();
            if results.iter().any(Result::is_ok) {
                return Ok(results);
            }
            match results.into_iter().find_map(Result::err) {
                Some(e) => {
                    error!(stage, error = %e, "Every call failed; failing the batch");
                    Err(e)
                }
                None => Ok(Vec::new()),
            }
        }
    }
}

/// The staged fetch → classify → augment → extract → confirm flow.
///
/// Collaborators are constructed by the caller and borrowed, so one
/// backend client serves every run.
pub struct Pipeline<'a, P, L, T> {
    provider: &'a P,
    llm: &'a L,
    tagger: &'a T,
    classify_concurrency: usize,
    extract_concurrency: usize,
    failure_policy: FailurePolicy,
}

impl<'a, P, L, T> Pipeline<'a, P, L, T>
where
    P: NewsProvider,
    L: LanguageModel,
    T: EntityTagger,
{
    pub fn new(provider: &'a P, llm: &'a L, tagger: &'a T, settings: &Settings) -> Self {
        Self {
            provider,
            llm,
            tagger,
            classify_concurrency: settings.classify_concurrency,
            extract_concurrency: settings.extract_concurrency,
            failure_policy: settings.failure_policy,
        }
    }

    /// Run the pipeline, reporting why a run produced nothing.
    ///
    /// `Ok` may still be empty when every extracted event was a false
    /// positive.
    #[instrument(level = "info", skip(self))]
    pub async fn try_run(
        &self,
        query: &str,
        period: &str,
        max_results: usize,
    ) -> Result<Vec<ConfirmedEvent>, PipelineError> {
        let t0 = Instant::now();

        let articles = self
            .provider
            .fetch(query, period, max_results)
            .await
            .map_err(PipelineError::FetchFailed)?;
        if articles.is_empty() {
            return Err(PipelineError::NoArticles);
        }
        info!(count = articles.len(), "Fetched articles");

        let relevant = classify::classify_relevance(
            self.llm,
            &articles,
            self.classify_concurrency,
            self.failure_policy,
        )
        .await
        .map_err(PipelineError::ClassifyFailed)?;
        if relevant.is_empty() {
            return Err(PipelineError::NoRelevantArticles);
        }

        let augmented = augment::augment_all(self.tagger, &relevant);

        let events = extract::extract_events(
            self.llm,
            &augmented,
            self.extract_concurrency,
            self.failure_policy,
        )
        .await
        .map_err(PipelineError::ExtractFailed)?;

        let confirmed = confirm::confirm(events, &relevant);
        info!(
            fetched = articles.len(),
            relevant = relevant.len(),
            confirmed = confirmed.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Pipeline finished"
        );
        Ok(confirmed)
    }

    /// Run the pipeline; every recoverable failure is logged and yields an
    /// empty result.
    pub async fn run(&self, query: &str, period: &str, max_results: usize) -> Vec<ConfirmedEvent> {
        match self.try_run(query, period, max_results).await {
            Ok(confirmed) => confirmed,
            Err(e @ (PipelineError::NoArticles | PipelineError::NoRelevantArticles)) => {
                warn!(reason = %e, "Pipeline produced no events");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Pipeline failed");
                Vec::new()
            }
        }
    }
}
