//! LLM-backed drafter.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use covenant_core::{parse_candidate, CandidateOutput};

use super::{DraftError, DraftRequest, Drafter};
use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::usage::{LlmUsage, UsageTracker};

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap();
}

/// Rate-limit retries per drafting call.
const MAX_RATE_LIMIT_RETRIES: usize = 3;

/// Drafts through an [`LlmProvider`].
///
/// One provider call per attempt, plus backoff retries when the provider
/// reports a rate limit. The response must be a JSON object matching the
/// candidate schema; anything else is `Malformed`.
pub struct LlmDrafter {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    usage: UsageTracker,
    min_backoff: Duration,
}

impl LlmDrafter {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            provider,
            config,
            usage: UsageTracker::new(),
            min_backoff: Duration::from_secs(1),
        }
    }

    /// Initial delay of the rate-limit backoff.
    pub fn with_min_backoff(mut self, delay: Duration) -> Self {
        self.min_backoff = delay;
        self
    }

    /// Token usage across every call made so far.
    pub fn usage(&self) -> LlmUsage {
        self.usage.snapshot()
    }

    fn messages(request: &DraftRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(prompts::system_prompt(request)),
            ChatMessage::user(prompts::user_prompt(request)),
        ]
    }
}

/// Strip code fences and any prose around the outermost JSON object.
pub(crate) fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let unfenced = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

#[async_trait]
impl Drafter for LlmDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<CandidateOutput, DraftError> {
        let messages = Self::messages(request);
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_times(MAX_RATE_LIMIT_RETRIES);

        let response = (|| async { self.provider.complete(messages.clone(), &self.config).await })
            .retry(backoff)
            .when(|e: &ProviderError| matches!(e, ProviderError::RateLimited { .. }))
            .notify(|e: &ProviderError, delay: Duration| {
                warn!(provider = self.provider.name(), error = %e, ?delay, "rate limited, backing off");
            })
            .await?;

        self.usage.record(&response.usage, &response.model);
        debug!(
            provider = self.provider.name(),
            attempt = request.attempt,
            tokens = response.usage.total(),
            "draft received"
        );

        if response.stop_reason.as_deref() == Some("refusal") {
            return Err(DraftError::Refused("model declined the request".to_string()));
        }
        if response.content.trim().is_empty() {
            return Err(DraftError::Refused("empty response".to_string()));
        }

        parse_candidate(extract_json(&response.content)).map_err(|e| DraftError::Malformed(e.to_string()))
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
