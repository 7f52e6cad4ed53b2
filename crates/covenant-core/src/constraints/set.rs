//! The constraint set type and its loaders.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::Severity;

use super::{
    CitationCount, ClauseLength, ConfidenceFloor, ConstraintError, ForbiddenPattern,
    JurisdictionRule, MandatoryClause, Rule,
};

/// An immutable, ordered list of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawConstraintSet", into = "RawConstraintSet")]
pub struct ConstraintSet {
    rules: Vec<Rule>,
    validity_threshold: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConstraintSet {
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    validity_threshold: Severity,
}

impl TryFrom<RawConstraintSet> for ConstraintSet {
    type Error = ConstraintError;

    fn try_from(raw: RawConstraintSet) -> Result<Self, Self::Error> {
        ConstraintSet::with_threshold(raw.rules, raw.validity_threshold)
    }
}

impl From<ConstraintSet> for RawConstraintSet {
    fn from(set: ConstraintSet) -> Self {
        Self {
            rules: set.rules,
            validity_threshold: set.validity_threshold,
        }
    }
}

impl ConstraintSet {
    /// Build a set where any violation invalidates a candidate.
    pub fn new(rules: Vec<Rule>) -> Result<Self, ConstraintError> {
        Self::with_threshold(rules, Severity::Low)
    }

    /// Build a set with an explicit validity threshold.
    ///
    /// A candidate is valid iff no violation has severity >= `threshold`.
    pub fn with_threshold(mut rules: Vec<Rule>, threshold: Severity) -> Result<Self, ConstraintError> {
        for rule in &rules {
            rule.validate()?;
        }
        // Stable: rules of the same phase keep their declared order.
        rules.sort_by_key(Rule::phase);
        Ok(Self {
            rules,
            validity_threshold: threshold,
        })
    }

    /// An empty set: every candidate is valid.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            validity_threshold: Severity::Low,
        }
    }

    /// Parse a constraint set from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConstraintError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a constraint set from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConstraintError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a constraint set from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConstraintError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Rules in check order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn validity_threshold(&self) -> Severity {
        self.validity_threshold
    }

    /// Whether a violation of this severity invalidates a candidate.
    pub fn invalidates(&self, severity: Severity) -> bool {
        severity >= self.validity_threshold
    }

    pub fn jurisdiction_rules(&self) -> impl Iterator<Item = &JurisdictionRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Jurisdiction(j) => Some(j),
            _ => None,
        })
    }

    pub fn forbidden_patterns(&self) -> impl Iterator<Item = &ForbiddenPattern> {
        self.rules.iter().filter_map(|r| match r {
            Rule::ForbiddenPattern(p) => Some(p),
            _ => None,
        })
    }

    pub fn mandatory_clauses(&self) -> impl Iterator<Item = &MandatoryClause> {
        self.rules.iter().filter_map(|r| match r {
            Rule::MandatoryClause(m) => Some(m),
            _ => None,
        })
    }

    pub fn citation_requirements(&self) -> impl Iterator<Item = &CitationCount> {
        self.rules.iter().filter_map(|r| match r {
            Rule::CitationCount(c) => Some(c),
            _ => None,
        })
    }

    pub fn confidence_floors(&self) -> impl Iterator<Item = &ConfidenceFloor> {
        self.rules.iter().filter_map(|r| match r {
            Rule::ConfidenceFloor(c) => Some(c),
            _ => None,
        })
    }

    pub fn clause_length_limits(&self) -> impl Iterator<Item = &ClauseLength> {
        self.rules.iter().filter_map(|r| match r {
            Rule::ClauseLength(c) => Some(c),
            _ => None,
        })
    }

    /// Tightest per-clause word limit, if any rule sets one.
    pub fn max_clause_words(&self) -> Option<usize> {
        self.clause_length_limits().map(|c| c.max_words).min()
    }

    /// All allowed jurisdictions, in declaration order.
    pub fn allowed_jurisdictions(&self) -> Vec<&str> {
        self.jurisdiction_rules()
            .flat_map(|r| r.allowed.iter().map(String::as_str))
            .collect()
    }

    /// Highest minimum-distinct-citation count across rules.
    pub fn min_distinct_citations(&self) -> usize {
        self.citation_requirements()
            .map(|c| c.min_distinct)
            .max()
            .unwrap_or(0)
    }
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET_YAML: &str = r#"
rules:
  - kind: clause_length
    max_words: 400
  - kind: confidence_floor
    floor: 0.5
  - kind: citation_count
    min_distinct: 2
  - kind: forbidden_pattern
    pattern: "(?i)unlimited\\s+liability"
    reason: "Never acceptable"
  - kind: jurisdiction
    allowed: ["European Union"]
"#;

    #[test]
    fn test_rules_sorted_into_check_order() {
        let set = ConstraintSet::from_yaml(SET_YAML).unwrap();
        let phases: Vec<_> = set.rules().iter().map(Rule::phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
        assert!(matches!(set.rules()[0], Rule::Jurisdiction(_)));
        assert!(matches!(set.rules().last(), Some(Rule::ClauseLength(_))));
    }

    #[test]
    fn test_accessors() {
        let set = ConstraintSet::from_yaml(SET_YAML).unwrap();
        assert_eq!(set.allowed_jurisdictions(), vec!["European Union"]);
        assert_eq!(set.min_distinct_citations(), 2);
        assert_eq!(set.forbidden_patterns().count(), 1);
        assert_eq!(set.max_clause_words(), Some(400));
        assert_eq!(ConstraintSet::empty().max_clause_words(), None);
        assert_eq!(set.validity_threshold(), Severity::Low);
        assert!(set.invalidates(Severity::Low));
    }

    #[test]
    fn test_threshold_from_yaml() {
        let set = ConstraintSet::from_yaml(
            r#"
validity_threshold: high
rules: []
"#,
        )
        .unwrap();
        assert!(!set.invalidates(Severity::Medium));
        assert!(set.invalidates(Severity::Critical));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_load() {
        let result = ConstraintSet::from_yaml(
            r#"
rules:
  - kind: forbidden_pattern
    pattern: "(broken"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_jurisdiction_rejected() {
        let result = ConstraintSet::new(vec![Rule::Jurisdiction(JurisdictionRule {
            allowed: vec![],
        })]);
        assert!(matches!(result, Err(ConstraintError::ValidationError(_))));
    }

    #[test]
    fn test_json_roundtrip_preserves_rules() {
        let set = ConstraintSet::from_yaml(SET_YAML).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back = ConstraintSet::from_json(&json).unwrap();
        assert_eq!(back.rules().len(), set.rules().len());
        assert_eq!(back.forbidden_patterns().next().unwrap().pattern, r"(?i)unlimited\s+liability");
    }
}
