//! LLM provider abstractions.
//!
//! The [`LlmProvider`] trait is the only place network calls to a model are
//! made. [`LlmDrafter`](crate::drafter::LlmDrafter) is its only caller.
//!
//! HTTP support is behind the `anthropic` and `openai` features. Without
//! them the providers still construct, and `complete` returns
//! [`ProviderError::NotConfigured`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{ProviderConfig, ProviderKind};

mod anthropic;
mod openai;
pub mod secrets;

pub use anthropic::{AnthropicProvider, ANTHROPIC_API_KEY_ENV};
pub use openai::{OpenAiProvider, AZURE_OPENAI_API_KEY_ENV, AZURE_OPENAI_ENDPOINT_ENV, OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Ask for a JSON object response where the provider supports it
    pub json_output: bool,

    /// Mark the system prompt cacheable (Anthropic)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
            json_output: true,
            prompt_caching: true,
        }
    }
}

impl From<&ProviderConfig> for CompletionConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout,
            json_output: true,
            prompt_caching: config.kind == ProviderKind::Anthropic,
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system" or "user"
    pub role: String,

    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,

    pub usage: TokenUsage,

    /// Model that served the request
    pub model: String,

    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,

    pub completion_tokens: u32,

    /// Tokens read from cache (Anthropic)
    pub cache_read_tokens: u32,

    /// Tokens written to cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

/// Build the provider selected by configuration.
///
/// Credentials come from the environment; a missing key is a
/// `NotConfigured` error here rather than on the first call.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::Anthropic => {
            let env = config.api_key_env.as_deref().unwrap_or(ANTHROPIC_API_KEY_ENV);
            let credential = ApiCredential::from_env(env, "Anthropic API key")?;
            let mut provider = AnthropicProvider::with_credential(credential);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAi => {
            let env = config.api_key_env.as_deref().unwrap_or(OPENAI_API_KEY_ENV);
            let credential = ApiCredential::from_env(env, "OpenAI API key")?;
            let mut provider = OpenAiProvider::openai(credential);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::AzureOpenAi => {
            let env = config.api_key_env.as_deref().unwrap_or(AZURE_OPENAI_API_KEY_ENV);
            let credential = ApiCredential::from_env(env, "Azure OpenAI API key")?;
            let endpoint = match &config.base_url {
                Some(url) => url.clone(),
                None => std::env::var(AZURE_OPENAI_ENDPOINT_ENV).map_err(|_| {
                    ProviderError::NotConfigured(format!(
                        "Azure OpenAI endpoint required: set provider.base_url or {}",
                        AZURE_OPENAI_ENDPOINT_ENV
                    ))
                })?,
            };
            Arc::new(OpenAiProvider::azure(credential, endpoint, config.api_version.clone()))
        }
    };

    info!(provider = provider.name(), model = %config.model, "LLM provider configured");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        assert_eq!(ChatMessage::system("rules").role, "system");
        assert_eq!(ChatMessage::user("draft").role, "user");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_completion_config_from_provider_config() {
        let config = CompletionConfig::from(&ProviderConfig::default());
        assert_eq!(config.max_tokens, 2048);
        assert!(config.json_output);
        assert!(config.prompt_caching);
    }

    #[test]
    fn test_build_provider_requires_key() {
        let config = ProviderConfig {
            api_key_env: Some("COVENANT_TEST_NO_SUCH_KEY".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_build_provider_from_env() {
        std::env::set_var("COVENANT_TEST_OPENAI_KEY", "sk-test");
        let config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            model: "gpt-4o".to_string(),
            api_key_env: Some("COVENANT_TEST_OPENAI_KEY".to_string()),
            ..Default::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        std::env::remove_var("COVENANT_TEST_OPENAI_KEY");
    }
}
