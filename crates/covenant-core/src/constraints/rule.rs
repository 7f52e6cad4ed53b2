//! Rule variants that make up a constraint set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Severity;

use super::ConstraintError;

/// Order in which the validator runs checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckPhase {
    Jurisdiction,
    ForbiddenPattern,
    MandatoryClause,
    CitationCount,
    ConfidenceFloor,
    ClauseLength,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckPhase::Jurisdiction => write!(f, "jurisdiction"),
            CheckPhase::ForbiddenPattern => write!(f, "forbidden_pattern"),
            CheckPhase::MandatoryClause => write!(f, "mandatory_clause"),
            CheckPhase::CitationCount => write!(f, "citation_count"),
            CheckPhase::ConfidenceFloor => write!(f, "confidence_floor"),
            CheckPhase::ClauseLength => write!(f, "clause_length"),
        }
    }
}

/// A single deterministic rule.
///
/// The set of kinds is closed: each kind has exactly one check function
/// in the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Jurisdiction(JurisdictionRule),
    ForbiddenPattern(ForbiddenPattern),
    MandatoryClause(MandatoryClause),
    CitationCount(CitationCount),
    ConfidenceFloor(ConfidenceFloor),
    ClauseLength(ClauseLength),
}

impl Rule {
    /// The check phase this rule belongs to.
    pub fn phase(&self) -> CheckPhase {
        match self {
            Rule::Jurisdiction(_) => CheckPhase::Jurisdiction,
            Rule::ForbiddenPattern(_) => CheckPhase::ForbiddenPattern,
            Rule::MandatoryClause(_) => CheckPhase::MandatoryClause,
            Rule::CitationCount(_) => CheckPhase::CitationCount,
            Rule::ConfidenceFloor(_) => CheckPhase::ConfidenceFloor,
            Rule::ClauseLength(_) => CheckPhase::ClauseLength,
        }
    }

    /// Structural checks that serde cannot express.
    pub(crate) fn validate(&self) -> Result<(), ConstraintError> {
        match self {
            Rule::Jurisdiction(rule) => {
                if rule.allowed.iter().all(|j| j.trim().is_empty()) {
                    return Err(ConstraintError::ValidationError(
                        "jurisdiction rule must allow at least one jurisdiction".to_string(),
                    ));
                }
            }
            Rule::ForbiddenPattern(_) => {}
            Rule::MandatoryClause(rule) => {
                if rule.category.trim().is_empty() {
                    return Err(ConstraintError::MissingField(
                        "mandatory_clause.category".to_string(),
                    ));
                }
                if rule.markers.iter().all(|m| m.trim().is_empty()) {
                    return Err(ConstraintError::ValidationError(format!(
                        "mandatory clause '{}' has no markers",
                        rule.category
                    )));
                }
            }
            Rule::CitationCount(_) => {}
            Rule::ConfidenceFloor(rule) => {
                if !(0.0..=1.0).contains(&rule.floor) {
                    return Err(ConstraintError::ValidationError(format!(
                        "confidence floor {} is outside [0, 1]",
                        rule.floor
                    )));
                }
            }
            Rule::ClauseLength(rule) => {
                if rule.max_words == 0 {
                    return Err(ConstraintError::ValidationError(
                        "clause length limit must be at least one word".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Governing jurisdiction must be one of `allowed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRule {
    pub allowed: Vec<String>,
}

impl JurisdictionRule {
    /// Case-insensitive, whitespace-trimmed membership.
    pub fn permits(&self, jurisdiction: &str) -> bool {
        let wanted = jurisdiction.trim();
        self.allowed
            .iter()
            .any(|j| j.trim().eq_ignore_ascii_case(wanted))
    }
}

/// Text that must not appear in any clause body.
///
/// `pattern` is a regular expression, compiled once when the rule is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawForbiddenPattern", into = "RawForbiddenPattern")]
pub struct ForbiddenPattern {
    pub pattern: String,
    pub reason: String,
    pub severity: Severity,
    regex: Regex,
}

impl ForbiddenPattern {
    /// Compile a forbidden pattern with the default `critical` severity.
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Result<Self, ConstraintError> {
        Self::with_severity(pattern, reason, Severity::Critical)
    }

    /// Compile a forbidden pattern with an explicit severity.
    pub fn with_severity(
        pattern: impl Into<String>,
        reason: impl Into<String>,
        severity: Severity,
    ) -> Result<Self, ConstraintError> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).map_err(|e| ConstraintError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern,
            reason: reason.into(),
            severity,
            regex,
        })
    }

    /// Whether the text contains a match.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// First matching excerpt, if any.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawForbiddenPattern {
    pattern: String,
    #[serde(default)]
    reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
}

impl TryFrom<RawForbiddenPattern> for ForbiddenPattern {
    type Error = ConstraintError;

    fn try_from(raw: RawForbiddenPattern) -> Result<Self, Self::Error> {
        ForbiddenPattern::with_severity(
            raw.pattern,
            raw.reason,
            raw.severity.unwrap_or(Severity::Critical),
        )
    }
}

impl From<ForbiddenPattern> for RawForbiddenPattern {
    fn from(p: ForbiddenPattern) -> Self {
        Self {
            pattern: p.pattern,
            reason: p.reason,
            severity: Some(p.severity),
        }
    }
}

/// A clause category that must be present for some contract types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandatoryClause {
    /// Category name (e.g. "liability_cap")
    pub category: String,

    /// Case-insensitive markers; any one in a title or body satisfies the rule
    pub markers: Vec<String>,

    /// Contract types the requirement applies to (empty = all)
    #[serde(default)]
    pub contract_types: Vec<String>,

    /// Human-readable directive used in corrections (e.g. "a liability cap clause")
    #[serde(default)]
    pub description: Option<String>,
}

impl MandatoryClause {
    /// Whether the requirement applies to a contract type.
    pub fn applies_to(&self, contract_type: &str) -> bool {
        let wanted = contract_type.trim();
        self.contract_types.is_empty()
            || self
                .contract_types
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(wanted))
    }

    /// Whether any marker appears in the text.
    pub fn satisfied_by(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .any(|m| haystack.contains(&m))
    }

    /// Directive text naming the clause to add.
    pub fn display_name(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("a {} clause", self.category.replace('_', " ")))
    }
}

/// Citation sufficiency requirements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CitationCount {
    /// Minimum number of distinct source ids across all clauses
    #[serde(default)]
    pub min_distinct: usize,

    /// Source ids that must each be cited
    #[serde(default)]
    pub required_ids: Vec<String>,

    /// Flag clauses without any citation
    #[serde(default)]
    pub require_per_clause: bool,

    /// Unresolvable ids are violations and do not count
    #[serde(default)]
    pub strict: bool,
}

/// Minimum drafter confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFloor {
    pub floor: f64,
}

/// Upper bound on the words in any single clause body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseLength {
    pub max_words: usize,
}

impl ClauseLength {
    /// Whitespace-separated word count of `text`, when it exceeds the limit.
    pub fn excess(&self, text: &str) -> Option<usize> {
        let words = text.split_whitespace().count();
        (words > self.max_words).then_some(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jurisdiction_permits_ignores_case_and_whitespace() {
        let rule = JurisdictionRule {
            allowed: vec!["European Union".to_string()],
        };
        assert!(rule.permits("european union"));
        assert!(rule.permits("  European Union "));
        assert!(!rule.permits("United States"));
    }

    #[test]
    fn test_forbidden_pattern_compiles_and_matches() {
        let rule = ForbiddenPattern::new(r"(?i)unlimited\s+liability", "never").unwrap();
        assert!(rule.is_match("The Processor accepts UNLIMITED  liability."));
        assert_eq!(rule.find("unlimited liability applies"), Some("unlimited liability"));
        assert_eq!(rule.severity, Severity::Critical);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = ForbiddenPattern::new(r"(unclosed", "bad");
        assert!(matches!(result, Err(ConstraintError::InvalidPattern { .. })));
    }

    #[test]
    fn test_rule_deserializes_tagged() {
        let rule: Rule = serde_yaml::from_str(
            r#"
kind: forbidden_pattern
pattern: "(?i)non-?compete"
reason: "No non-compete"
"#,
        )
        .unwrap();
        match rule {
            Rule::ForbiddenPattern(p) => {
                assert!(p.is_match("a Non-Compete covenant"));
                assert_eq!(p.severity, Severity::Critical);
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn test_mandatory_clause_applies_and_matches() {
        let rule = MandatoryClause {
            category: "liability_cap".to_string(),
            markers: vec!["Limitation of Liability".to_string()],
            contract_types: vec!["Master Services Agreement".to_string()],
            description: None,
        };
        assert!(rule.applies_to("master services agreement"));
        assert!(!rule.applies_to("Privacy Policy"));
        assert!(rule.satisfied_by("12. LIMITATION OF LIABILITY"));
        assert_eq!(rule.display_name(), "a liability cap clause");
    }

    #[test]
    fn test_confidence_floor_out_of_range() {
        let rule = Rule::ConfidenceFloor(ConfidenceFloor { floor: 1.5 });
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_phase_order() {
        assert!(CheckPhase::Jurisdiction < CheckPhase::ForbiddenPattern);
        assert!(CheckPhase::CitationCount < CheckPhase::ConfidenceFloor);
        assert!(CheckPhase::ConfidenceFloor < CheckPhase::ClauseLength);
    }

    #[test]
    fn test_clause_length_counts_words() {
        let rule: Rule = serde_yaml::from_str("kind: clause_length\nmax_words: 3\n").unwrap();
        let Rule::ClauseLength(limit) = rule else {
            panic!("expected clause_length rule");
        };
        assert_eq!(limit.excess("one  two\nthree"), None);
        assert_eq!(limit.excess("one two three four"), Some(4));
        assert!(Rule::ClauseLength(ClauseLength { max_words: 0 }).validate().is_err());
    }
}
