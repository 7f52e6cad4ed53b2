//! Anthropic Messages API provider.

use async_trait::async_trait;

use super::secrets::{ApiCredential, CredentialSource};
use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic Claude provider.
///
/// The system prompt is sent as a single cacheable block when
/// `prompt_caching` is on, so retries within a session hit the cache.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    #[cfg(feature = "anthropic")]
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    pub fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            #[cfg(feature = "anthropic")]
            client: reqwest::Client::new(),
        }
    }

    /// Read `ANTHROPIC_API_KEY` from the environment.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::with_credential(credential))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(feature = "anthropic")]
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    pub(super) struct AnthropicRequest {
        pub model: String,
        pub max_tokens: u32,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub system: Vec<ContentBlock>,
        pub messages: Vec<AnthropicMessage>,
        pub temperature: f32,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct AnthropicMessage {
        pub role: String,
        pub content: Vec<ContentBlock>,
    }

    #[derive(Debug, Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub(super) enum ContentBlock {
        Text {
            text: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cache_control: Option<CacheControl>,
        },
    }

    #[derive(Debug, Serialize)]
    pub(super) struct CacheControl {
        #[serde(rename = "type")]
        pub type_: String,
    }

    impl CacheControl {
        pub fn ephemeral() -> Self {
            Self {
                type_: "ephemeral".to_string(),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicResponse {
        pub content: Vec<ContentBlockResponse>,
        pub model: String,
        pub stop_reason: Option<String>,
        pub usage: AnthropicUsage,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ContentBlockResponse {
        pub text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicUsage {
        pub input_tokens: u32,
        pub output_tokens: u32,
        #[serde(default)]
        pub cache_creation_input_tokens: u32,
        #[serde(default)]
        pub cache_read_input_tokens: u32,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicError {
        pub error: AnthropicErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicErrorDetail {
        pub message: String,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[cfg(feature = "anthropic")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use super::TokenUsage;
        use std::time::Duration;
        use wire::*;

        let mut system = Vec::new();
        let mut api_messages = Vec::new();
        for msg in messages {
            if msg.role == "system" {
                system.push(ContentBlock::Text {
                    text: msg.content,
                    cache_control: config.prompt_caching.then(CacheControl::ephemeral),
                });
            } else {
                api_messages.push(AnthropicMessage {
                    role: msg.role,
                    content: vec![ContentBlock::Text {
                        text: msg.content,
                        cache_control: None,
                    }],
                });
            }
        }

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages: api_messages,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let error_body = response
                .json::<AnthropicError>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_body.error.message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    #[cfg(not(feature = "anthropic"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Anthropic provider requires 'anthropic' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key").with_base_url("https://proxy.local/v1/");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url(), "https://proxy.local/v1");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-REDACTED";
        let provider = AnthropicProvider::new(secret_key);
        let debug_output = format!("{:?}", provider);

        assert!(!debug_output.contains(secret_key), "API key was exposed in Debug output!");
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[cfg(not(feature = "anthropic"))]
    #[tokio::test]
    async fn test_complete_without_feature() {
        let provider = AnthropicProvider::new("sk-ant-key");
        let result = provider
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
