//! Retrieval caching.
//!
//! Retrieval results depend only on the query, so repeated sessions for the
//! same contract type skip the underlying retriever until the entry expires.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CitationSnippet, RetrievalError, RetrievalQuery, Retriever};
use crate::config::CacheConfig;

/// Caches successful results of an inner retriever. Failures are not cached.
pub struct CachedRetriever<R> {
    inner: R,
    cache: Cache<RetrievalQuery, Arc<Vec<CitationSnippet>>>,
}

impl<R: Retriever> CachedRetriever<R> {
    pub fn new(inner: R, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    pub fn from_config(inner: R, config: &CacheConfig) -> Self {
        Self::new(inner, config.max_entries, config.ttl)
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<R: Retriever> Retriever for CachedRetriever<R> {
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<CitationSnippet>, RetrievalError> {
        if let Some(hit) = self.cache.get(query).await {
            debug!(retriever = self.inner.name(), "retrieval cache hit");
            return Ok(hit.as_ref().clone());
        }

        let snippets = self.inner.retrieve(query).await?;
        self.cache
            .insert(query.clone(), Arc::new(snippets.clone()))
            .await;
        Ok(snippets)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::StaticRetriever;

    fn query() -> RetrievalQuery {
        RetrievalQuery::new("Data Processing Agreement", "European Union", Some("dpa".to_string()))
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let inner = StaticRetriever::new(vec![CitationSnippet::new(
            vec!["DPA-7.1".to_string()],
            "Aggregate liability is capped.",
            "legora_dpa",
        )]);
        let cached = CachedRetriever::new(inner, 16, Duration::from_secs(60));

        let first = cached.retrieve(&query()).await.unwrap();
        let second = cached.retrieve(&query()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().call_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_queries_not_shared() {
        let cached = CachedRetriever::new(StaticRetriever::empty(), 16, Duration::from_secs(60));
        cached.retrieve(&query()).await.unwrap();
        cached
            .retrieve(&RetrievalQuery::new("Privacy Policy", "European Union", None))
            .await
            .unwrap();
        assert_eq!(cached.inner().call_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let cached = CachedRetriever::new(
            StaticRetriever::failing("index offline"),
            16,
            Duration::from_secs(60),
        );
        assert!(cached.retrieve(&query()).await.is_err());
        assert!(cached.retrieve(&query()).await.is_err());
        assert_eq!(cached.inner().call_count(), 2);
    }
}
