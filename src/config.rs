//! Study and client configuration.
//!
//! Settings come from an optional JSON file, then CLI flags (which in turn
//! read `CONJOINT_*` environment variables). The credential is never part of
//! the file; it is read from the environment into a [`ClientConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PAUSE_SECONDS: f64 = 10.0;
pub const DEFAULT_MAX_REPLY_TOKENS: u32 = 150;
pub const DEFAULT_SAMPLE_SIZE: usize = 20;
pub const DEFAULT_SUBMIT_COUNT: usize = 5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Environment variables consulted for the bearer token, in order.
pub const API_KEY_VARS: &[&str] = &["CONJOINT_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: set one of {}", API_KEY_VARS.join(", "))]
    MissingApiKey,
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Failure policy
// =============================================================================

/// What the study loop does when a single call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the pair with an error marker and move on.
    #[default]
    SkipAndContinue,
    /// Stop the run; already collected records are kept.
    Abort,
}

// =============================================================================
// Client configuration
// =============================================================================

/// Everything needed to reach the choice endpoint.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_reply_tokens: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_reply_tokens", &self.max_reply_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Build with defaults for everything but the key. Fails on an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_reply_tokens: DEFAULT_MAX_REPLY_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    /// Read the key from the first non-empty variable in [`API_KEY_VARS`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Self::new(key)
    }

    /// Apply the endpoint-related knobs of a study configuration.
    pub fn with_study(mut self, study: &StudyConfig) -> Self {
        self.base_url = study.base_url.clone();
        self.model = study.model.clone();
        self.max_reply_tokens = study.max_reply_tokens;
        self.timeout = Duration::from_secs(study.timeout_seconds);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_reply_tokens(mut self, max: u32) -> Self {
        self.max_reply_tokens = max;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Study configuration
// =============================================================================

/// Run parameters. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    pub model: String,
    pub base_url: String,
    /// Courtesy pause before each call.
    pub pause_seconds: f64,
    pub max_reply_tokens: u32,
    /// Pairs drawn from the profile space.
    pub sample_size: usize,
    /// Leading sampled pairs actually submitted.
    pub submit_count: usize,
    pub seed: Option<u64>,
    pub failure_policy: FailurePolicy,
    pub timeout_seconds: u64,
    /// Catalog JSON; the built-in laptop catalog when absent.
    pub catalog: Option<PathBuf>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pause_seconds: DEFAULT_PAUSE_SECONDS,
            max_reply_tokens: DEFAULT_MAX_REPLY_TOKENS,
            sample_size: DEFAULT_SAMPLE_SIZE,
            submit_count: DEFAULT_SUBMIT_COUNT,
            seed: None,
            failure_policy: FailurePolicy::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            catalog: None,
        }
    }
}

impl StudyConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        parse_base_url(&self.base_url).map_err(ConfigError::Invalid)?;
        if !self.pause_seconds.is_finite() || self.pause_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pause_seconds must be a non-negative number, got {}",
                self.pause_seconds
            )));
        }
        if self.max_reply_tokens == 0 {
            return Err(ConfigError::Invalid("max_reply_tokens must be >= 1".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeout_seconds must be >= 1".into()));
        }
        Ok(())
    }

    /// Invalid values (negative, NaN) collapse to no pause; `validate` rejects them first.
    pub fn pause(&self) -> Duration {
        Duration::try_from_secs_f64(self.pause_seconds).unwrap_or_default()
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
pub(crate) fn parse_base_url(raw: &str) -> Result<reqwest::Url, String> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| format!("base_url {raw:?} is not an absolute URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(format!("base_url {raw:?} must be an http(s) URL with a host"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_survey_setup() {
        let c = StudyConfig::default();
        assert_eq!(c.pause(), Duration::from_secs(10));
        assert_eq!(c.max_reply_tokens, 150);
        assert_eq!(c.sample_size, 20);
        assert_eq!(c.submit_count, 5);
        assert_eq!(c.failure_policy, FailurePolicy::SkipAndContinue);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let c: StudyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, StudyConfig::default());
    }

    #[test]
    fn file_overrides_and_policy_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");
        std::fs::write(
            &path,
            r#"{"model": "m", "pause_seconds": 0.5, "seed": 9, "failure_policy": "abort"}"#,
        )
        .unwrap();
        let c = StudyConfig::from_path(&path).unwrap();
        assert_eq!(c.model, "m");
        assert_eq!(c.pause(), Duration::from_millis(500));
        assert_eq!(c.seed, Some(9));
        assert_eq!(c.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");
        std::fs::write(&path, r#"{"api_key": "sk-nope"}"#).unwrap();
        assert!(matches!(
            StudyConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn negative_pause_is_invalid() {
        let c = StudyConfig {
            pause_seconds: -1.0,
            ..StudyConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn base_url_must_be_absolute_http() {
        for url in ["", "api.openai.com/v1", "file:///tmp/x", "mailto:a@b.c"] {
            let c = StudyConfig {
                base_url: url.into(),
                ..StudyConfig::default()
            };
            assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))), "{url}");
        }
        let local = StudyConfig {
            base_url: "http://127.0.0.1:8080/v1".into(),
            ..StudyConfig::default()
        };
        assert!(local.validate().is_ok());
    }

    #[test]
    fn empty_key_is_missing() {
        assert!(matches!(ClientConfig::new(""), Err(ConfigError::MissingApiKey)));
        assert!(matches!(ClientConfig::new("   "), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn client_takes_study_knobs_and_hides_key() {
        let study = StudyConfig {
            model: "m".into(),
            max_reply_tokens: 7,
            ..StudyConfig::default()
        };
        let client = ClientConfig::new("sk-secret").unwrap().with_study(&study);
        assert_eq!(client.model, "m");
        assert_eq!(client.max_reply_tokens, 7);
        assert!(!format!("{client:?}").contains("sk-secret"));
    }
}
