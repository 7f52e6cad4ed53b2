//! OpenAI and Azure OpenAI chat-completions provider.
//!
//! Both endpoints speak the same request and response format and differ
//! only in URL layout and auth header.

use async_trait::async_trait;

use super::secrets::ApiCredential;
use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const AZURE_OPENAI_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Flavor {
    OpenAi,
    Azure { api_version: String },
}

/// OpenAI-compatible chat completions.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    flavor: Flavor,
    #[cfg(feature = "openai")]
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("flavor", &self.flavor)
            .finish()
    }
}

impl OpenAiProvider {
    /// api.openai.com with bearer auth.
    pub fn openai(credential: ApiCredential) -> Self {
        Self::build(credential, OPENAI_BASE_URL.to_string(), Flavor::OpenAi)
    }

    /// An Azure OpenAI resource. The model name is the deployment name.
    pub fn azure(credential: ApiCredential, endpoint: impl Into<String>, api_version: Option<String>) -> Self {
        let api_version = api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
        Self::build(credential, endpoint.into(), Flavor::Azure { api_version })
    }

    fn build(credential: ApiCredential, base_url: String, flavor: Flavor) -> Self {
        Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            flavor,
            #[cfg(feature = "openai")]
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Chat completions URL for a model.
    pub fn endpoint_url(&self, model: &str) -> String {
        match &self.flavor {
            Flavor::OpenAi => format!("{}/chat/completions", self.base_url),
            Flavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url, model, api_version
            ),
        }
    }
}

#[cfg(feature = "openai")]
mod wire {
    use serde::{Deserialize, Serialize};

    use crate::providers::ChatMessage;

    #[derive(Debug, Serialize)]
    pub(super) struct ChatRequest<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<&'a str>,
        pub messages: &'a [ChatMessage],
        pub max_tokens: u32,
        pub temperature: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_format: Option<ResponseFormat>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct ResponseFormat {
        #[serde(rename = "type")]
        pub type_: &'static str,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ChatResponse {
        pub choices: Vec<Choice>,
        #[serde(default)]
        pub model: String,
        #[serde(default)]
        pub usage: Option<Usage>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Choice {
        pub message: ResponseMessage,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ResponseMessage {
        pub content: Option<String>,
        #[serde(default)]
        pub refusal: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Usage {
        pub prompt_tokens: u32,
        pub completion_tokens: u32,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ErrorBody {
        pub error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ErrorDetail {
        pub message: String,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[cfg(feature = "openai")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use super::TokenUsage;
        use std::time::Duration;
        use wire::*;

        let request = ChatRequest {
            // Azure routes by deployment in the URL
            model: match self.flavor {
                Flavor::OpenAi => Some(config.model.as_str()),
                Flavor::Azure { .. } => None,
            },
            messages: &messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: config.json_output.then_some(ResponseFormat { type_: "json_object" }),
        };

        let builder = self
            .client
            .post(self.endpoint_url(&config.model))
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request);
        let builder = match self.flavor {
            Flavor::OpenAi => builder.bearer_auth(self.credential.expose()),
            Flavor::Azure { .. } => builder.header("api-key", self.credential.expose()),
        };

        let response = builder.send().await.map_err(|e| {
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
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|e| e.to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        // Refusals surface as an empty body with a refusal stop reason
        let (content, stop_reason) = match choice.message.refusal {
            Some(_) => (String::new(), Some("refusal".to_string())),
            None => (choice.message.content.unwrap_or_default(), choice.finish_reason),
        };

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                ..Default::default()
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: if body.model.is_empty() {
                config.model.clone()
            } else {
                body.model
            },
            stop_reason,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenAI provider requires 'openai' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        match self.flavor {
            Flavor::OpenAi => "openai",
            Flavor::Azure { .. } => "azure_openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialSource;

    fn credential() -> ApiCredential {
        ApiCredential::new("sk-test-key", CredentialSource::Programmatic, "Test key")
    }

    #[test]
    fn test_openai_url() {
        let provider = OpenAiProvider::openai(credential());
        assert_eq!(
            provider.endpoint_url("gpt-4o"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_azure_url_uses_deployment() {
        let provider = OpenAiProvider::azure(credential(), "https://legal.openai.azure.com/", None);
        assert_eq!(
            provider.endpoint_url("clause-drafter"),
            "https://legal.openai.azure.com/openai/deployments/clause-drafter/chat/completions?api-version=2024-06-01"
        );
        assert_eq!(provider.name(), "azure_openai");
    }

    #[test]
    fn test_key_not_in_debug_output() {
        let provider = OpenAiProvider::openai(credential());
        assert!(!format!("{:?}", provider).contains("sk-test-key"));
    }
}
