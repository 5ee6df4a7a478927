//! Runtime settings.
//!
//! Settings come from an optional YAML file; anything not given keeps its
//! default. The backend credential is read from `OPENAI_API_KEY` (after
//! loading a `.env` file from the working directory, if present) and is
//! never part of the YAML file.
//!
//! ```yaml
//! model: gpt-4o-mini
//! base_url: https://api.openai.com/v1
//! classify_concurrency: 10
//! extract_concurrency: 5
//! request_timeout_secs: 60
//! failure_policy: fail_closed
//! ```

use crate::error::ConfigError;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How a batch stage reacts when individual backend calls fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed call fails the whole stage and the run yields no events.
    #[default]
    FailClosed,
    /// Failed items are logged and skipped; the rest of the batch proceeds.
    Isolate,
}

/// Pipeline and backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Chat model used for both classification and extraction.
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    pub temperature: f32,
    /// In-flight relevance classification requests.
    pub classify_concurrency: usize,
    /// In-flight structured extraction requests.
    pub extract_concurrency: usize,
    /// Per-call timeout; expiry counts as a failed call.
    pub request_timeout_secs: u64,
    /// Retries for transient backend failures.
    pub max_retries: usize,
    /// First backoff delay; doubles on each retry.
    pub retry_base_delay_ms: u64,
    pub failure_policy: FailurePolicy,
    /// News feed language, e.g. `en`.
    pub news_language: String,
    /// News feed country, e.g. `US`.
    pub news_country: String,
    /// Extra place names for the entity tagger, one per line.
    pub gazetteer_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            classify_concurrency: 10,
            extract_concurrency: 5,
            request_timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            failure_policy: FailurePolicy::FailClosed,
            news_language: "en".to_string(),
            news_country: "US".to_string(),
            gazetteer_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let settings = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
                info!(path = %path.display(), "Loaded settings");
                settings
            }
            None => {
                debug!("No settings file given; using defaults");
                Self::default()
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML text. An empty document yields defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("must be within [0.0, 2.0], got {}", self.temperature),
            ));
        }
        if self.classify_concurrency == 0 {
            return Err(ConfigError::invalid("classify_concurrency", "must be at least 1"));
        }
        if self.extract_concurrency == 0 {
            return Err(ConfigError::invalid("extract_concurrency", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Read the backend API key, loading `.env` first if one exists.
pub fn api_key_from_env() -> Result<SecretString, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env file");
    }
    api_key_from(std::env::var("OPENAI_API_KEY").ok())
}

fn api_key_from(value: Option<String>) -> Result<SecretString, ConfigError> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(SecretString::from(key.trim().to_string())),
        _ => Err(ConfigError::MissingApiKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.classify_concurrency, 10);
        assert_eq!(settings.extract_concurrency, 5);
        assert_eq!(settings.failure_policy, FailurePolicy::FailClosed);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("model: gpt-4o\nfailure_policy: isolate\n").unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.failure_policy, FailurePolicy::Isolate);
        assert_eq!(settings.extract_concurrency, 5);
        assert_eq!(settings.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Settings::from_yaml("modle: gpt-4o\n").is_err());
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        let settings = Settings {
            extract_concurrency: 0,
            ..Default::default()
        };
        match settings.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "extract_concurrency"),
            other => panic!("expected invalid setting, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_base_url_is_invalid() {
        let settings = Settings {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "base_url", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "classify_concurrency: 3\nrequest_timeout_secs: 15").unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.classify_concurrency, 3);
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_api_key_required() {
        assert!(matches!(api_key_from(None), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            api_key_from(Some("   ".to_string())),
            Err(ConfigError::MissingApiKey)
        ));
        let key = api_key_from(Some(" sk-test ".to_string())).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }
}
