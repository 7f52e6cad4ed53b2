//! Markdown parsing: anchored citations, chunks and document metadata.

use super::patterns::{is_section_start, source_ids, HEADING_PATTERN, SOURCE_ID_PATTERN, TITLE_PATTERN};
use super::{CitationEntry, DocumentChunk, DocumentMetadata};

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 800;

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_SECTION: &str = "Introduction";

/// First H1 heading, or "Untitled".
pub fn extract_title(content: &str) -> String {
    TITLE_PATTERN
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// All H2 headings, in order.
pub fn extract_sections(content: &str) -> Vec<String> {
    HEADING_PATTERN
        .captures_iter(content)
        .filter(|c| c.get(1).map(|m| m.as_str().len()) == Some(2))
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Most recent heading that starts before `position`.
fn heading_before(content: &str, position: usize) -> String {
    HEADING_PATTERN
        .captures_iter(content)
        .take_while(|c| c.get(0).map(|m| m.start() < position).unwrap_or(false))
        .last()
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string())
}

/// Parse every `[SourceID: X]` anchor into a citation.
///
/// An anchor's text runs up to the next anchor, heading or `---` rule.
/// Anchors with no text are dropped.
pub fn parse_citations(content: &str, document_name: &str) -> Vec<CitationEntry> {
    let anchors: Vec<_> = SOURCE_ID_PATTERN.captures_iter(content).collect();
    let mut citations = Vec::with_capacity(anchors.len());

    for (i, anchor) in anchors.iter().enumerate() {
        let (Some(whole), Some(id)) = (anchor.get(0), anchor.get(1)) else {
            continue;
        };
        let end = anchors
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(content.len());

        let body: Vec<&str> = content[whole.end()..end]
            .trim()
            .lines()
            .take_while(|line| {
                let line = line.trim();
                !line.starts_with('#') && line != "---"
            })
            .collect();
        let text = body.join("\n");
        let text = SOURCE_ID_PATTERN.replace_all(text.trim(), "");
        let text = text.trim();

        if !text.is_empty() {
            citations.push(CitationEntry {
                source_id: id.as_str().trim().to_string(),
                text: text.to_string(),
                document_name: document_name.to_string(),
                section_heading: heading_before(content, whole.start()),
            });
        }
    }

    citations
}

/// Split on lines starting a `## ` section; the preamble is its own piece.
fn split_sections(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if is_section_start(line) && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    sections.push(current.join("\n"));
    sections
}

/// Split a document into chunks of roughly [`CHUNK_SIZE`] characters.
///
/// Sections that fit stay whole; longer sections are packed paragraph by
/// paragraph. A single paragraph longer than the target becomes its own
/// chunk. Every chunk carries the source ids anchored inside it.
pub fn chunk_document(content: &str, document_name: &str, chunk_size: usize) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for (section_idx, section) in split_sections(content).iter().enumerate() {
        if section.chars().count() <= chunk_size {
            chunks.push(DocumentChunk {
                chunk_id: format!("{}::chunk_{}", document_name, section_idx),
                text: section.trim().to_string(),
                document_name: document_name.to_string(),
                source_ids: source_ids(section),
            });
            continue;
        }

        let mut current = String::new();
        let mut current_ids: Vec<String> = Vec::new();
        let mut sub_idx = 0;

        for para in section.split("\n\n") {
            let para_ids = source_ids(para);
            if !current.is_empty() && current.chars().count() + para.chars().count() > chunk_size {
                chunks.push(DocumentChunk {
                    chunk_id: format!("{}::chunk_{}_{}", document_name, section_idx, sub_idx),
                    text: current.trim().to_string(),
                    document_name: document_name.to_string(),
                    source_ids: std::mem::take(&mut current_ids),
                });
                current = para.to_string();
                current_ids = para_ids;
                sub_idx += 1;
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(para);
                current_ids.extend(para_ids);
            }
        }

        if !current.trim().is_empty() {
            chunks.push(DocumentChunk {
                chunk_id: format!("{}::chunk_{}_{}", document_name, section_idx, sub_idx),
                text: current.trim().to_string(),
                document_name: document_name.to_string(),
                source_ids: current_ids,
            });
        }
    }

    chunks
}

/// Metadata for one ingested file.
pub fn document_metadata(filename: &str, content: &str, total_citations: usize) -> DocumentMetadata {
    DocumentMetadata {
        filename: filename.to_string(),
        title: extract_title(content),
        total_citations,
        sections: extract_sections(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Data Processing Agreement

## 6. Security

[SourceID: DPA-6.2] The Processor shall notify the Controller without undue delay.

[SourceID: DPA-6.3] Encryption at rest is mandatory.
---

## 7. Liability

[SourceID: DPA-7.1] Aggregate liability is capped at fees paid.
### 7.2 Notes
Trailing notes.
";

    #[test]
    fn test_title_and_sections() {
        assert_eq!(extract_title(DOC), "Data Processing Agreement");
        assert_eq!(extract_sections(DOC), vec!["6. Security", "7. Liability"]);
        assert_eq!(extract_title("no headings"), "Untitled");
    }

    #[test]
    fn test_parse_citations_stop_at_boundaries() {
        let citations = parse_citations(DOC, "legora_dpa");
        let ids: Vec<_> = citations.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["DPA-6.2", "DPA-6.3", "DPA-7.1"]);

        assert_eq!(
            citations[0].text,
            "The Processor shall notify the Controller without undue delay."
        );
        assert_eq!(citations[1].text, "Encryption at rest is mandatory.");
        assert_eq!(citations[2].text, "Aggregate liability is capped at fees paid.");
        assert_eq!(citations[2].section_heading, "7. Liability");
        assert_eq!(citations[0].document_name, "legora_dpa");
    }

    #[test]
    fn test_heading_defaults_to_introduction() {
        let citations = parse_citations("[SourceID: X-1] Preamble text.", "doc");
        assert_eq!(citations[0].section_heading, "Introduction");
    }

    #[test]
    fn test_chunks_keep_source_ids() {
        let chunks = chunk_document(DOC, "legora_dpa", CHUNK_SIZE);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_id, "legora_dpa::chunk_0");
        assert_eq!(chunks[1].source_ids, vec!["DPA-6.2", "DPA-6.3"]);
        assert_eq!(chunks[2].source_ids, vec!["DPA-7.1"]);
    }

    #[test]
    fn test_long_sections_split_by_paragraph() {
        let para = "x".repeat(300);
        let section = format!(
            "## Long\n\n[SourceID: A-1] {}\n\n[SourceID: A-2] {}\n\n[SourceID: A-3] {}",
            para, para, para
        );
        let chunks = chunk_document(&section, "doc", CHUNK_SIZE);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chunk_id.starts_with("doc::chunk_0_")));
        let all_ids: Vec<_> = chunks.iter().flat_map(|c| c.source_ids.clone()).collect();
        assert_eq!(all_ids, vec!["A-1", "A-2", "A-3"]);
    }
}
