//! Corpus-backed retrieval.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use covenant_core::CitationCorpus;

use super::{CitationSnippet, RetrievalError, RetrievalQuery, Retriever};
use crate::config::RetrievalConfig;

/// Returns the chunks of the document mapped to the request's contract type.
///
/// Contract types with no mapped document (or whose document is missing from
/// the corpus) get the first chunks of the whole corpus instead.
pub struct CorpusRetriever {
    corpus: Arc<CitationCorpus>,
    /// Lowercased contract type -> document name
    documents: BTreeMap<String, String>,
    limit: usize,
    fallback_limit: usize,
}

impl CorpusRetriever {
    pub fn new(corpus: Arc<CitationCorpus>, config: &RetrievalConfig) -> Self {
        let documents = config
            .documents
            .iter()
            .map(|(contract_type, doc)| (normalize(contract_type), doc.clone()))
            .collect();

        Self {
            corpus,
            documents,
            limit: config.limit,
            fallback_limit: config.fallback_limit,
        }
    }

    /// Document mapped to a contract type, if any.
    pub fn document_for(&self, contract_type: &str) -> Option<&str> {
        self.documents.get(&normalize(contract_type)).map(String::as_str)
    }

    fn snippets(&self, contract_type: &str) -> Vec<CitationSnippet> {
        if let Some(doc) = self.document_for(contract_type) {
            let mapped: Vec<CitationSnippet> = self
                .corpus
                .chunks_for(doc)
                .take(self.limit)
                .map(CitationSnippet::from)
                .collect();
            if !mapped.is_empty() {
                return mapped;
            }
            debug!(document = doc, "mapped document has no chunks, using corpus fallback");
        }

        self.corpus
            .chunks()
            .iter()
            .take(self.fallback_limit.min(self.limit))
            .map(CitationSnippet::from)
            .collect()
    }
}

fn normalize(contract_type: &str) -> String {
    contract_type.trim().to_lowercase()
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<CitationSnippet>, RetrievalError> {
        let snippets = self.snippets(&query.contract_type);
        debug!(
            contract_type = %query.contract_type,
            snippets = snippets.len(),
            "retrieved corpus context"
        );
        Ok(snippets)
    }

    fn name(&self) -> &str {
        "corpus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DPA: &str = "# Data Processing Agreement

## 6. Security

[SourceID: DPA-6.2] Processor shall implement appropriate technical measures.

## 7. Liability

[SourceID: DPA-7.1] Aggregate liability is capped at the fees paid.
";

    const MSA: &str = "# Master Services Agreement

## 4. Fees

[SourceID: MSA-4.1] Fees are payable within thirty days.
";

    fn retriever(limit: usize) -> CorpusRetriever {
        let corpus =
            CitationCorpus::from_documents([("legora_dpa.md", DPA), ("zegal_msa.md", MSA)]).unwrap();
        let config = RetrievalConfig {
            limit,
            ..Default::default()
        };
        CorpusRetriever::new(Arc::new(corpus), &config)
    }

    fn query(contract_type: &str) -> RetrievalQuery {
        RetrievalQuery::new(contract_type, "European Union", None)
    }

    #[tokio::test]
    async fn test_mapped_document_only() {
        let retriever = retriever(15);
        let snippets = retriever.retrieve(&query("data processing agreement")).await.unwrap();
        assert!(!snippets.is_empty());
        assert!(snippets.iter().all(|s| s.document_name == "legora_dpa"));
        assert!(snippets.iter().any(|s| s.source_ids.contains(&"DPA-7.1".to_string())));
    }

    #[tokio::test]
    async fn test_unmapped_type_uses_whole_corpus() {
        let retriever = retriever(15);
        let snippets = retriever.retrieve(&query("Employment Contract")).await.unwrap();
        let docs: Vec<_> = snippets.iter().map(|s| s.document_name.as_str()).collect();
        assert!(docs.contains(&"legora_dpa"));
        assert!(docs.contains(&"zegal_msa"));
    }

    #[tokio::test]
    async fn test_limit_applied() {
        let retriever = retriever(1);
        let snippets = retriever.retrieve(&query("Data Processing Agreement")).await.unwrap();
        assert_eq!(snippets.len(), 1);
    }
}
