//! Source retrieval: the context handed to the drafter.
//!
//! A [`Retriever`] returns citation snippets for a request. An empty result
//! is not a failure; an `Err` aborts the session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use covenant_core::{CorpusError, DocumentChunk};

mod cache;
mod corpus;
mod fixed;

pub use cache::CachedRetriever;
pub use corpus::CorpusRetriever;
pub use fixed::StaticRetriever;

/// Errors from retrievers.
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("Retrieval source unavailable: {0}")]
    Unavailable(String),

    #[error("Corpus error: {0}")]
    Corpus(String),
}

impl From<CorpusError> for RetrievalError {
    fn from(err: CorpusError) -> Self {
        RetrievalError::Corpus(err.to_string())
    }
}

/// What a session asks the retriever for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetrievalQuery {
    pub contract_type: String,
    pub jurisdiction: String,
    pub preset: Option<String>,
}

impl RetrievalQuery {
    pub fn new(
        contract_type: impl Into<String>,
        jurisdiction: impl Into<String>,
        preset: Option<String>,
    ) -> Self {
        Self {
            contract_type: contract_type.into(),
            jurisdiction: jurisdiction.into(),
            preset,
        }
    }
}

/// A piece of source text with the ids it can be cited by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSnippet {
    pub source_ids: Vec<String>,
    pub text: String,
    pub document_name: String,
}

impl CitationSnippet {
    pub fn new(source_ids: Vec<String>, text: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self {
            source_ids,
            text: text.into(),
            document_name: document_name.into(),
        }
    }
}

impl From<&DocumentChunk> for CitationSnippet {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            source_ids: chunk.source_ids.clone(),
            text: chunk.text.clone(),
            document_name: chunk.document_name.clone(),
        }
    }
}

/// Source of drafting context.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<CitationSnippet>, RetrievalError>;

    /// Name for logs.
    fn name(&self) -> &str;
}
