//! Typed errors for every boundary of the analysis pipeline.
//!
//! Each concern gets its own enum so the stage that absorbs a failure can
//! decide what to do with it:
//!
//! - [`ConfigError`]: fatal, raised before any network activity
//! - [`FetchError`]: the news provider could not produce articles
//! - [`BackendError`]: the language-model service failed a call
//! - [`SchemaViolation`]: a structured response did not decode or validate
//! - [`TaggerError`]: the entity tagger is unavailable
//! - [`PipelineError`]: why a run produced no confirmed events

use thiserror::Error;

/// Configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `OPENAI_API_KEY` is unset or blank.
    #[error("missing OPENAI_API_KEY in environment")]
    MissingApiKey,

    /// The settings file could not be read.
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML for [`crate::config::Settings`].
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting holds a value the pipeline cannot run with.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The shared HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl ConfigError {
    /// Create an invalid-setting error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures while fetching articles from the news provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("news feed returned status {0}")]
    Status(u16),

    #[error("cannot decode news feed: {0}")]
    Feed(#[from] quick_xml::de::DeError),

    #[error("invalid feed URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failures of a single call to the language-model backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, reset, DNS failure, etc.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded the configured request timeout.
    #[error("request timed out")]
    Timeout,

    /// The backend rejected the credentials.
    #[error("authentication failed (status {0})")]
    Auth(u16),

    /// The backend asked us to slow down.
    #[error("rate limited by backend")]
    RateLimited,

    /// Any other non-success status.
    #[error("backend returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The envelope around the completion was not what the API documents.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A structured response that does not conform to its schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaViolation {
    /// Not JSON, wrong field types, or a required field is missing.
    #[error("{schema}: cannot decode response: {message}")]
    Decode {
        schema: &'static str,
        message: String,
    },

    /// The JSON ended early, usually a response cut off by a token limit.
    #[error("{schema}: response truncated: {message}")]
    Truncated {
        schema: &'static str,
        message: String,
    },

    /// Decoded, but a field value is outside its allowed range.
    #[error("{schema}: field `{field}` {reason}")]
    OutOfRange {
        schema: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Failure of a typed structured-output call.
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

/// The entity tagger cannot serve requests.
#[derive(Debug, Error)]
pub enum TaggerError {
    #[error("entity tagger unavailable: {0}")]
    Unavailable(String),
}

/// Why a pipeline run produced no confirmed events.
///
/// `Ok(vec![])` from [`crate::pipeline::Pipeline::try_run`] still means
/// "articles were analysed and none was confirmed".
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch news articles: {0}")]
    FetchFailed(#[source] FetchError),

    #[error("no news articles found")]
    NoArticles,

    #[error("relevance classification failed: {0}")]
    ClassifyFailed(#[source] BackendError),

    #[error("no relevant articles after pre-filtering")]
    NoRelevantArticles,

    #[error("detailed extraction failed: {0}")]
    ExtractFailed(#[source] StructuredError),
}
