//! Language-model backend interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`LanguageModel`]: core trait with the two call shapes the pipeline uses,
//!   free-text completion and JSON-schema constrained completion
//! - [`OpenAiBackend`]: OpenAI-compatible chat-completions client over `reqwest`
//! - [`RetryBackend`]: decorator that adds retry logic to any [`LanguageModel`]
//! - [`extract`]: typed structured call with strict decode-and-validate
//!
//! The backend is constructed once by the caller and passed into the
//! pipeline; the `reqwest::Client` inside it keeps one connection pool for
//! the whole process.
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (network, timeout, 429, 5xx)
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::Settings;
use crate::error::{BackendError, ConfigError, SchemaViolation, StructuredError};
use crate::schema::{StructuredOutput, decode};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A named JSON schema a structured completion must conform to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn of<T: StructuredOutput>() -> Self {
        Self {
            name: T::NAME,
            schema: <T as StructuredOutput>::json_schema(),
        }
    }
}

/// Async access to a language-model backend.
///
/// Every call is fallible and possibly slow; implementations must not
/// retry internally (wrap them in [`RetryBackend`] instead).
pub trait LanguageModel {
    /// Free-text completion of `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;

    /// Completion constrained to `schema`, returned as raw JSON text.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<String, BackendError>;
}

/// Ask for a `T` and decode the answer strictly.
///
/// A response that was cut off mid-JSON is re-asked once before being
/// reported as a schema violation.
#[instrument(level = "debug", skip_all, fields(schema = T::NAME))]
pub async fn extract<T, L>(llm: &L, prompt: &str) -> Result<T, StructuredError>
where
    T: StructuredOutput,
    L: LanguageModel,
{
    let schema = ResponseSchema::of::<T>();
    let raw = llm.complete_structured(prompt, &schema).await?;
    match decode::<T>(&raw) {
        Ok(value) => Ok(value),
        Err(SchemaViolation::Truncated { message, .. }) => {
            warn!(error = %message, "Structured response truncated; re-asking once");
            let raw = llm.complete_structured(prompt, &schema).await?;
            Ok(decode::<T>(&raw)?)
        }
        Err(violation) => {
            debug!(
                response_preview = %truncate_for_log(&raw, 300),
                "Structured response failed validation"
            );
            Err(violation.into())
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`LanguageModel`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
pub struct RetryBackend<T> {
    /// The underlying backend to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
    /// Upper bound of the random jitter added to every delay.
    max_jitter: StdDuration,
}

impl<T> RetryBackend<T>
where
    T: LanguageModel,
{
    /// Create a new retry wrapper around an existing [`LanguageModel`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let backend = OpenAiBackend::new(&settings, api_key)?;
    /// let backend = RetryBackend::new(backend, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let mut delay = self.base_delay.saturating_mul(1 << shift);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + StdDuration::from_millis(jitter_ms)
    }

    async fn with_retries<R, F, Fut>(&self, call: &'static str, mut f: F) -> Result<R, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, BackendError>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match f().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() || attempt > self.max_retries {
                        error!(
                            call,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "backend call gave up"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        call,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "backend call failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBackend")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> LanguageModel for RetryBackend<T>
where
    T: LanguageModel,
{
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        self.with_retries("complete", || self.inner.complete(prompt))
            .await
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<String, BackendError> {
        self.with_retries("complete_structured", || {
            self.inner.complete_structured(prompt, schema)
        })
        .await
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'static str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// OpenAI-compatible chat-completions backend.
#[derive(Clone)]
pub struct OpenAiBackend {
    http_client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Build the backend and its HTTP client. No request is sent.
    pub fn new(settings: &Settings, api_key: SecretString) -> Result<Self, ConfigError> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        debug!(model = %settings.model, base_url = %settings.base_url, "Initialized LLM client");
        Ok(Self {
            http_client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str, schema: Option<&'a ResponseSchema>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: schema.map(|s| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: s.name,
                    strict: true,
                    schema: &s.schema,
                },
            }),
        }
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model, structured = schema.is_some()))]
    async fn send(
        &self,
        prompt: &str,
        schema: Option<&ResponseSchema>,
    ) -> Result<String, BackendError> {
        let t0 = Instant::now();
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request(prompt, schema))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let dt = t0.elapsed();

        if !status.is_success() {
            warn!(elapsed_ms = dt.as_millis(), %status, body = %truncate_for_log(&body, 300), "API call failed");
            return Err(status_error(status, body));
        }
        debug!(elapsed_ms = dt.as_millis(), bytes = body.len(), "API call succeeded");
        parse_completion(&body)
    }
}

impl LanguageModel for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        self.send(prompt, None).await
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<String, BackendError> {
        self.send(prompt, Some(schema)).await
    }
}

/// Map a non-success HTTP status to a [`BackendError`].
fn status_error(status: StatusCode, body: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(status.as_u16()),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout,
        _ => BackendError::Api {
            status: status.as_u16(),
            body: truncate_for_log(&body, 500),
        },
    }
}

/// Pull the first choice's content out of a chat-completions body.
fn parse_completion(body: &str) -> Result<String, BackendError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Malformed("no choices in response".into()))?
        .message;
    if let Some(refusal) = message.refusal {
        return Err(BackendError::Malformed(format!("model refused: {refusal}")));
    }
    message
        .content
        .ok_or_else(|| BackendError::Malformed("choice has no content".into()))
}
