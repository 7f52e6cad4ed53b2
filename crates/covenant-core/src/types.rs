//! Shared domain types: drafted candidates, violations, validation results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Severity of a violation, and risk level of a drafted clause.
///
/// Ordered from least to most severe so thresholds can use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Risk levels share the severity vocabulary.
pub type RiskLevel = Severity;

impl Severity {
    /// Uppercase label used in correction addenda.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A citation embedded in a drafted clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRef {
    /// Corpus source identifier (e.g. "DPA-7.1")
    pub source_id: String,

    /// Why the source supports the clause
    #[serde(default)]
    pub relevance: String,
}

impl CitationRef {
    pub fn new(source_id: impl Into<String>, relevance: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            relevance: relevance.into(),
        }
    }
}

/// A single drafted clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Clause heading
    pub title: String,

    /// Clause body text
    pub text: String,

    /// Supporting citations
    #[serde(default)]
    pub citations: Vec<CitationRef>,

    /// Drafter's risk assessment
    #[serde(default)]
    pub risk_level: RiskLevel,

    /// Drafter's reasoning
    #[serde(default)]
    pub reasoning: String,
}

impl Clause {
    /// Create a low-risk clause without citations.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            citations: Vec::new(),
            risk_level: RiskLevel::Low,
            reasoning: String::new(),
        }
    }

    /// Add a citation.
    pub fn cite(mut self, source_id: impl Into<String>, relevance: impl Into<String>) -> Self {
        self.citations.push(CitationRef::new(source_id, relevance));
        self
    }

    /// Set the risk level.
    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }
}

/// One drafting attempt's structured output.
///
/// Each attempt produces a fresh instance; candidates are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutput {
    /// Drafted clauses, in order
    pub clauses: Vec<Clause>,

    /// Overall summary
    pub summary: String,

    /// Declared governing jurisdiction
    pub governing_jurisdiction: String,

    /// Drafter confidence in [0, 1]
    pub confidence_score: f64,
}

impl CandidateOutput {
    /// Distinct citation source ids across all clauses, sorted.
    pub fn distinct_source_ids(&self) -> BTreeSet<&str> {
        self.clauses
            .iter()
            .flat_map(|c| c.citations.iter())
            .map(|c| c.source_id.as_str())
            .collect()
    }

    /// All clause bodies joined with a space.
    pub fn full_text(&self) -> String {
        self.clauses
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single deterministic constraint failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Field or clause the violation applies to
    pub field: String,

    /// Human-readable description
    pub message: String,

    /// Severity of the violation
    pub severity: Severity,

    /// Suggested fix, phrased as a drafting directive (may be empty)
    #[serde(default)]
    pub suggestion: String,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity,
            suggestion: suggestion.into(),
        }
    }
}

/// Outcome of one validator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the candidate passed
    pub is_valid: bool,

    /// Violations in check order
    #[serde(default)]
    pub violations: Vec<Violation>,

    /// Drafting attempt that produced the candidate (1-based)
    pub attempt_number: u32,
}

impl ValidationResult {
    /// Set the attempt number.
    pub fn with_attempt(mut self, attempt_number: u32) -> Self {
        self.attempt_number = attempt_number;
        self
    }

    /// Human-readable summary of all violations.
    pub fn violation_summary(&self) -> String {
        if self.violations.is_empty() {
            return "No violations found.".to_string();
        }
        let mut lines = vec![format!("Found {} violation(s):", self.violations.len())];
        for v in &self.violations {
            lines.push(format!("  [{}] {}: {}", v.severity.label(), v.field, v.message));
        }
        lines.join("\n")
    }

    /// Highest severity present, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }

    #[test]
    fn test_distinct_source_ids() {
        let candidate = CandidateOutput {
            clauses: vec![
                Clause::new("A", "a").cite("DPA-7.1", "x").cite("DPA-7.1", "y"),
                Clause::new("B", "b").cite("DPA-6.2", "z"),
            ],
            summary: String::new(),
            governing_jurisdiction: "European Union".to_string(),
            confidence_score: 0.9,
        };
        let ids: Vec<_> = candidate.distinct_source_ids().into_iter().collect();
        assert_eq!(ids, vec!["DPA-6.2", "DPA-7.1"]);
    }

    #[test]
    fn test_clause_defaults_from_json() {
        let clause: Clause =
            serde_json::from_str(r#"{"title": "T", "text": "Body"}"#).unwrap();
        assert!(clause.citations.is_empty());
        assert_eq!(clause.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_violation_summary() {
        let result = ValidationResult {
            is_valid: false,
            violations: vec![Violation::new(
                "governing_jurisdiction",
                "Wrong jurisdiction",
                Severity::High,
                "",
            )],
            attempt_number: 1,
        };
        let summary = result.violation_summary();
        assert!(summary.contains("[HIGH] governing_jurisdiction"));
        assert_eq!(result.max_severity(), Some(Severity::High));
    }
}
