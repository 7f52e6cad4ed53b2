//! Fixed-result retriever for tests and replay.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CitationSnippet, RetrievalError, RetrievalQuery, Retriever};

/// Always returns the same snippets, or always fails.
pub struct StaticRetriever {
    result: Result<Vec<CitationSnippet>, RetrievalError>,
    calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(snippets: Vec<CitationSnippet>) -> Self {
        Self {
            result: Ok(snippets),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: Err(RetrievalError::Unavailable(reason.into())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `retrieve` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &RetrievalQuery) -> Result<Vec<CitationSnippet>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}
