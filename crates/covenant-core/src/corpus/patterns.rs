//! Markdown patterns shared by corpus ingestion.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Citation anchor: `[SourceID: DPA-7.1]`
    pub static ref SOURCE_ID_PATTERN: Regex = Regex::new(
        r"\[SourceID:\s*([^\]]+)\]"
    ).unwrap();

    /// Any ATX heading, level in group 1 and text in group 2
    pub static ref HEADING_PATTERN: Regex = Regex::new(
        r"(?m)^(#{1,6})\s+(.+)$"
    ).unwrap();

    /// Level-one heading only
    pub static ref TITLE_PATTERN: Regex = Regex::new(
        r"(?m)^#\s+(.+)$"
    ).unwrap();
}

/// Every anchored source id in the text, in order of appearance.
pub fn source_ids(text: &str) -> Vec<String> {
    SOURCE_ID_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Whether a line starts a level-two section (`## `).
pub fn is_section_start(line: &str) -> bool {
    line.strip_prefix("##")
        .and_then(|rest| rest.chars().next())
        .map(char::is_whitespace)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_trimmed() {
        let ids = source_ids("See [SourceID: DPA-7.1] and [SourceID:  Priv-4.1 ].");
        assert_eq!(ids, vec!["DPA-7.1", "Priv-4.1"]);
    }

    #[test]
    fn test_section_start() {
        assert!(is_section_start("## Liability"));
        assert!(!is_section_start("### Sub"));
        assert!(!is_section_start("# Title"));
        assert!(!is_section_start("##"));
    }
}
