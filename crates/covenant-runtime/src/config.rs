//! Runtime configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `COVENANT_MAX_ATTEMPTS` | `max_attempts` |
//! | `COVENANT_EVENT_BUFFER` | `event_buffer` |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const MAX_ATTEMPTS_ENV: &str = "COVENANT_MAX_ATTEMPTS";
pub const EVENT_BUFFER_ENV: &str = "COVENANT_EVENT_BUFFER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Drafting attempt ceiling per session
    pub max_attempts: u32,

    /// Capacity of the per-session event channel
    pub event_buffer: usize,

    pub retrieval: RetrievalConfig,

    pub cache: CacheConfig,

    pub provider: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            event_buffer: 64,
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Defaults or the given file, then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(MAX_ATTEMPTS_ENV) {
            self.max_attempts = parse_env(MAX_ATTEMPTS_ENV, &raw)?;
        }
        if let Some(raw) = lookup(EVENT_BUFFER_ENV) {
            self.event_buffer = parse_env(EVENT_BUFFER_ENV, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer", "must be at least 1"));
        }
        if self.retrieval.limit == 0 {
            return Err(invalid("retrieval.limit", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(invalid("provider.temperature", "must be within [0, 2]"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string()))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Corpus retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum snippets handed to the drafter
    pub limit: usize,

    /// Corpus-wide chunks used when the contract type maps to no document
    pub fallback_limit: usize,

    /// Contract type -> corpus document name
    pub documents: BTreeMap<String, String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let documents = [
            ("Data Processing Agreement", "legora_dpa"),
            ("Privacy Policy", "legora_privacy"),
            ("Master Services Agreement", "zegal_msa"),
            ("Non-Disclosure Agreement", "legora_dpa"),
            ("Service Level Agreement", "zegal_msa"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            limit: 15,
            fallback_limit: 20,
            documents,
        }
    }
}

/// Retrieval cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    /// Entry lifetime, e.g. "10m"
    #[serde(with = "humantime_duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Which LLM backend drafts clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Model name (deployment name for Azure)
    pub model: String,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Per-request timeout, e.g. "30s"
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    /// Custom API endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key (provider default if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Azure OpenAI API version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
            base_url: None,
            api_key_env: None,
            api_version: None,
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
