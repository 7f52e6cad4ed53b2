//! Clause drafting: the generative half of the loop.
//!
//! A [`Drafter`] turns a prompt, the retrieved context, and every correction
//! addendum so far into one structured candidate. Drafters hold no session
//! state; each call carries everything it needs.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use covenant_core::{CandidateOutput, ConstraintSet};

use crate::providers::ProviderError;
use crate::retrieval::CitationSnippet;

mod llm;
mod scripted;

pub use llm::LlmDrafter;
pub use scripted::ScriptedDrafter;

/// Why a drafting attempt produced no candidate.
///
/// Every variant is recoverable: the orchestrator treats it as an implicit
/// violation and retries while attempts remain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    #[error("Drafting timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed drafter output: {0}")]
    Malformed(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Drafter refused: {0}")]
    Refused(String),
}

impl From<ProviderError> for DraftError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(after) => DraftError::Timeout(after),
            ProviderError::ParseError(msg) => DraftError::Malformed(msg),
            other => DraftError::Provider(other.to_string()),
        }
    }
}

/// Everything one drafting call needs.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub prompt: String,
    pub contract_type: String,
    pub jurisdiction: String,

    /// Retrieved source context, identical on every attempt
    pub context: Vec<CitationSnippet>,

    /// Correction addenda from all prior attempts, oldest first
    pub corrections: Vec<String>,

    pub constraints: Arc<ConstraintSet>,

    /// 1-based
    pub attempt: u32,
}

#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> Result<CandidateOutput, DraftError>;

    /// Name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_map_to_draft_errors() {
        let timeout = DraftError::from(ProviderError::Timeout(Duration::from_secs(30)));
        assert_eq!(timeout, DraftError::Timeout(Duration::from_secs(30)));

        let parse = DraftError::from(ProviderError::ParseError("eof".to_string()));
        assert!(matches!(parse, DraftError::Malformed(_)));

        let auth = DraftError::from(ProviderError::AuthError);
        assert!(matches!(auth, DraftError::Provider(_)));
    }
}
