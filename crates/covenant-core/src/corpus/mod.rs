//! Citation corpus.
//!
//! Loads Markdown source documents carrying `[SourceID: X]` anchors, builds
//! a citation index, and splits documents into chunks for retrieval. The
//! corpus is read-only once loaded and is shared across sessions.

mod ingest;
mod patterns;

pub use ingest::{chunk_document, extract_sections, extract_title, parse_citations, CHUNK_SIZE};
pub use patterns::source_ids;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::validator::CitationResolver;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Citation '{0}' not found")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No Markdown documents found in {0}")]
    Empty(String),
}

/// One citable paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub source_id: String,
    pub text: String,
    /// File stem of the source document (e.g. "legora_dpa")
    pub document_name: String,
    pub section_heading: String,
}

/// A retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub document_name: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub title: String,
    pub total_citations: usize,
    pub sections: Vec<String>,
}

/// The loaded corpus.
#[derive(Debug, Clone)]
pub struct CitationCorpus {
    citations: BTreeMap<String, CitationEntry>,
    chunks: Vec<DocumentChunk>,
    documents: Vec<DocumentMetadata>,
}

impl CitationCorpus {
    /// Build a corpus from `(filename, content)` pairs.
    ///
    /// The document name is the filename without its extension. When two
    /// documents anchor the same id, the later one wins.
    pub fn from_documents<'a, I>(documents: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut corpus = Self {
            citations: BTreeMap::new(),
            chunks: Vec::new(),
            documents: Vec::new(),
        };

        for (filename, content) in documents {
            let name = Path::new(filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(filename)
                .to_string();

            let citations = parse_citations(content, &name);
            let total = citations.len();
            for entry in citations {
                corpus.citations.insert(entry.source_id.clone(), entry);
            }
            corpus.chunks.extend(chunk_document(content, &name, CHUNK_SIZE));
            corpus
                .documents
                .push(ingest::document_metadata(filename, content, total));

            debug!(document = %name, citations = total, "ingested document");
        }

        if corpus.documents.is_empty() {
            return Err(CorpusError::Empty("<memory>".to_string()));
        }
        Ok(corpus)
    }

    /// Load every `*.md` file in a directory, in sorted filename order.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let dir = dir.as_ref();
        let io_err = |source: std::io::Error| CorpusError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map(|e| e == "md").unwrap_or(false))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CorpusError::Empty(dir.display().to_string()));
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = fs::read_to_string(path).map_err(|source| CorpusError::Io {
                path: path.clone(),
                source,
            })?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            files.push((filename, content));
        }

        let corpus = Self::from_documents(files.iter().map(|(f, c)| (f.as_str(), c.as_str())))?;
        info!(
            dir = %dir.display(),
            documents = corpus.documents.len(),
            citations = corpus.citations.len(),
            chunks = corpus.chunks.len(),
            "citation corpus loaded"
        );
        Ok(corpus)
    }

    /// Look up a citation by source id.
    pub fn lookup(&self, source_id: &str) -> Result<&CitationEntry, CorpusError> {
        self.citations
            .get(source_id.trim())
            .ok_or_else(|| CorpusError::NotFound(source_id.to_string()))
    }

    /// All citations, sorted by source id.
    pub fn citations(&self) -> impl Iterator<Item = &CitationEntry> {
        self.citations.values()
    }

    /// All chunks in document order.
    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// Chunks of one document, in document order.
    pub fn chunks_for<'a>(&'a self, document_name: &'a str) -> impl Iterator<Item = &'a DocumentChunk> {
        self.chunks
            .iter()
            .filter(move |c| c.document_name == document_name)
    }

    pub fn documents(&self) -> &[DocumentMetadata] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

impl CitationResolver for CitationCorpus {
    fn resolves(&self, source_id: &str) -> bool {
        self.citations.contains_key(source_id.trim())
    }
}
