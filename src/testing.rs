//! Test doubles for the pipeline's external collaborators.

use crate::api::{LanguageModel, ResponseSchema};
use crate::error::{BackendError, FetchError, TaggerError};
use crate::models::{Article, NlpEntities};
use crate::nlp::EntityTagger;
use crate::scrapers::NewsProvider;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

pub fn article(title: &str) -> Article {
    let slug = title.to_lowercase().replace(' ', "-");
    Article {
        title: title.to_string(),
        link: Url::parse(&format!("https://news.example.com/{slug}")).unwrap(),
        published: "Mon, 06 May 2025 14:30:00 GMT".to_string(),
        summary: format!("Report: {title}."),
    }
}

pub fn event_json(is_disaster_related: bool, disaster_type: Option<&str>, confidence: f64) -> String {
    serde_json::json!({
        "title": null,
        "is_disaster_related": is_disaster_related,
        "disaster_type": disaster_type,
        "locations": [],
        "summary": "Stub summary.",
        "event_date": null,
        "casualties": null,
        "confidence": confidence,
        "source_url": null,
    })
    .to_string()
}

/// Replays queued responses in call order.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    complete: Mutex<VecDeque<Result<String, BackendError>>>,
    structured: Mutex<VecDeque<Result<String, BackendError>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete_ok(self, text: &str) -> Self {
        self.complete.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn complete_err(self, e: BackendError) -> Self {
        self.complete.lock().unwrap().push_back(Err(e));
        self
    }

    pub fn structured_ok(self, json: &str) -> Self {
        self.structured.lock().unwrap().push_back(Ok(json.to_string()));
        self
    }

    pub fn structured_err(self, e: BackendError) -> Self {
        self.structured.lock().unwrap().push_back(Err(e));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LanguageModel for ScriptedBackend {
    async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.complete
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted completion left")
    }

    async fn complete_structured(
        &self,
        _prompt: &str,
        _schema: &ResponseSchema,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted structured response left")
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, BackendError>>;

/// Counts calls currently in flight and the most seen at once.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Answers from the prompt text, so results do not depend on call order.
pub struct PromptBackend {
    classify: Responder,
    extract: Responder,
    delay: Box<dyn Fn(&str) -> Duration>,
    classify_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    classify_in_flight: InFlight,
    extract_in_flight: InFlight,
    extract_prompts: Mutex<Vec<String>>,
}

impl PromptBackend {
    pub fn new(
        classify: impl Fn(&str) -> Result<String, BackendError> + 'static,
        extract: impl Fn(&str) -> Result<String, BackendError> + 'static,
    ) -> Self {
        Self {
            classify: Box::new(classify),
            extract: Box::new(extract),
            delay: Box::new(|_| Duration::ZERO),
            classify_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            classify_in_flight: InFlight::default(),
            extract_in_flight: InFlight::default(),
            extract_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to force out-of-order completion.
    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Most classification calls seen in flight at once.
    pub fn classify_peak(&self) -> usize {
        self.classify_in_flight.peak()
    }

    /// Most extraction calls seen in flight at once.
    pub fn extract_peak(&self) -> usize {
        self.extract_in_flight.peak()
    }

    pub fn extract_prompts(&self) -> Vec<String> {
        self.extract_prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for PromptBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.classify_in_flight.enter();
        tokio::time::sleep((self.delay)(prompt)).await;
        self.classify_in_flight.exit();
        (self.classify)(prompt)
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        _schema: &ResponseSchema,
    ) -> Result<String, BackendError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.extract_prompts.lock().unwrap().push(prompt.to_string());
        self.extract_in_flight.enter();
        tokio::time::sleep((self.delay)(prompt)).await;
        self.extract_in_flight.exit();
        (self.extract)(prompt)
    }
}

/// Returns a fixed article list, or fails.
pub struct StubProvider {
    articles: Option<Vec<Article>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn with(articles: Vec<Article>) -> Self {
        Self {
            articles: Some(articles),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            articles: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NewsProvider for StubProvider {
    async fn fetch(
        &self,
        _query: &str,
        _period: &str,
        max_results: usize,
    ) -> Result<Vec<Article>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.articles {
            Some(articles) => Ok(articles.iter().take(max_results).cloned().collect()),
            None => Err(FetchError::Status(503)),
        }
    }
}

/// Returns the same entities for every text, or is unavailable.
pub struct StubTagger(pub Option<NlpEntities>);

impl EntityTagger for StubTagger {
    fn extract(&self, _text: &str) -> Result<NlpEntities, TaggerError> {
        self.0
            .clone()
            .ok_or_else(|| TaggerError::Unavailable("stub".to_string()))
    }
}
