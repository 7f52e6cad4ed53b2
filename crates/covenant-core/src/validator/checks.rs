//! One pure check function per rule kind.
//!
//! Each function takes the rule and the candidate and returns the violations
//! it found, in a deterministic order.

use std::collections::BTreeSet;

use crate::constraints::{
    CitationCount, ClauseLength, ConfidenceFloor, ForbiddenPattern, JurisdictionRule,
    MandatoryClause,
};
use crate::types::{CandidateOutput, Severity, Violation};

use super::CitationResolver;

/// Declared governing jurisdiction must be whitelisted.
pub(crate) fn check_jurisdiction(
    rule: &JurisdictionRule,
    candidate: &CandidateOutput,
) -> Option<Violation> {
    if rule.permits(&candidate.governing_jurisdiction) {
        return None;
    }

    let allowed = rule.allowed.join(", ");
    Some(Violation::new(
        "governing_jurisdiction",
        format!(
            "Expected jurisdiction '{}' but got '{}'.",
            allowed, candidate.governing_jurisdiction
        ),
        Severity::High,
        format!("Set governing_jurisdiction to '{}'.", allowed),
    ))
}

/// One violation per clause whose body matches the pattern.
pub(crate) fn check_forbidden(
    rule: &ForbiddenPattern,
    candidate: &CandidateOutput,
) -> Vec<Violation> {
    candidate
        .clauses
        .iter()
        .enumerate()
        .filter_map(|(i, clause)| {
            let excerpt = rule.find(&clause.text)?;
            let mut message = format!(
                "Forbidden pattern detected in clause '{}': '{}'.",
                clause.title, excerpt
            );
            if !rule.reason.is_empty() {
                message.push_str(&format!(" Reason: {}", rule.reason));
            }
            Some(Violation::new(
                format!("clauses[{}].text", i),
                message,
                rule.severity,
                format!(
                    "Remove the forbidden clause referencing '{}' from '{}'.",
                    excerpt, clause.title
                ),
            ))
        })
        .collect()
}

/// Some clause title or body must carry one of the category markers.
pub(crate) fn check_mandatory(
    rule: &MandatoryClause,
    candidate: &CandidateOutput,
    contract_type: &str,
) -> Option<Violation> {
    if !rule.applies_to(contract_type) {
        return None;
    }

    let present = candidate
        .clauses
        .iter()
        .any(|c| rule.satisfied_by(&c.title) || rule.satisfied_by(&c.text));
    if present {
        return None;
    }

    let name = rule.display_name();
    Some(Violation::new(
        format!("mandatory_clause.{}", rule.category),
        format!("Required clause missing: {}.", name),
        Severity::Critical,
        format!("Add {}.", name),
    ))
}

/// Distinct-count, required ids, per-clause presence and strict resolution.
pub(crate) fn check_citations(
    rule: &CitationCount,
    candidate: &CandidateOutput,
    resolver: Option<&dyn CitationResolver>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let cited = candidate.distinct_source_ids();

    // Unresolved ids only stop counting under strict checking.
    let counted: BTreeSet<&str> = match (rule.strict, resolver) {
        (true, Some(resolver)) => {
            for id in cited.iter().filter(|id| !resolver.resolves(id)) {
                violations.push(Violation::new(
                    format!("citations.{}", id),
                    format!("Citation '{}' does not resolve to any known source.", id),
                    Severity::Medium,
                    format!("Replace '{}' with a source id from the provided context.", id),
                ));
            }
            cited.iter().copied().filter(|id| resolver.resolves(id)).collect()
        }
        _ => cited.clone(),
    };

    if counted.len() < rule.min_distinct {
        violations.push(Violation::new(
            "citations",
            format!(
                "Found {} distinct citation(s); at least {} are required.",
                counted.len(),
                rule.min_distinct
            ),
            Severity::Medium,
            format!(
                "Cite at least {} distinct sources across the clauses.",
                rule.min_distinct
            ),
        ));
    }

    for required in &rule.required_ids {
        if !cited.contains(required.as_str()) {
            violations.push(Violation::new(
                format!("required_citations.{}", required),
                format!("Required citation '{}' is missing from the output.", required),
                Severity::Medium,
                format!("Include a citation to [SourceID: {}] in your response.", required),
            ));
        }
    }

    if rule.require_per_clause {
        for (i, clause) in candidate.clauses.iter().enumerate() {
            if clause.citations.is_empty() {
                violations.push(Violation::new(
                    format!("clauses[{}].citations", i),
                    format!("Clause '{}' has no supporting citation.", clause.title),
                    Severity::Medium,
                    format!("Cite at least 1 source for clause '{}'.", clause.title),
                ));
            }
        }
    }

    violations
}

pub(crate) fn check_confidence(
    rule: &ConfidenceFloor,
    candidate: &CandidateOutput,
) -> Option<Violation> {
    if candidate.confidence_score >= rule.floor {
        return None;
    }
    Some(Violation::new(
        "confidence_score",
        format!(
            "Confidence {:.2} is below the required floor of {:.2}.",
            candidate.confidence_score, rule.floor
        ),
        Severity::Low,
        "Ground every clause in the provided sources so the draft can be stated with confidence.",
    ))
}

/// One violation per clause whose body runs past the word limit.
pub(crate) fn check_clause_length(
    rule: &ClauseLength,
    candidate: &CandidateOutput,
) -> Vec<Violation> {
    candidate
        .clauses
        .iter()
        .enumerate()
        .filter_map(|(i, clause)| {
            let words = rule.excess(&clause.text)?;
            Some(Violation::new(
                format!("clauses[{}].length", i),
                format!(
                    "Clause '{}' has {} words, exceeding the limit of {}.",
                    clause.title, words, rule.max_words
                ),
                Severity::Low,
                format!("Shorten this clause to under {} words.", rule.max_words),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Clause;

    fn candidate(clauses: Vec<Clause>) -> CandidateOutput {
        CandidateOutput {
            clauses,
            summary: "Summary".to_string(),
            governing_jurisdiction: "European Union".to_string(),
            confidence_score: 0.8,
        }
    }

    struct KnownIds(Vec<&'static str>);

    impl CitationResolver for KnownIds {
        fn resolves(&self, source_id: &str) -> bool {
            self.0.contains(&source_id)
        }
    }

    #[test]
    fn test_forbidden_one_violation_per_clause() {
        let rule = ForbiddenPattern::new(r"(?i)unlimited\s+liability", "never").unwrap();
        let c = candidate(vec![
            Clause::new("Liability", "Unlimited liability applies. Unlimited liability again."),
            Clause::new("Term", "Two years."),
            Clause::new("Indemnity", "Supplier bears unlimited liability."),
        ]);
        let violations = check_forbidden(&rule, &c);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "clauses[0].text");
        assert_eq!(violations[1].field, "clauses[2].text");
        assert_eq!(violations[0].severity, Severity::Critical);
        assert!(violations[0].suggestion.contains("Liability"));
    }

    #[test]
    fn test_mandatory_checks_titles_too() {
        let rule = MandatoryClause {
            category: "liability_cap".to_string(),
            markers: vec!["limitation of liability".to_string()],
            contract_types: vec![],
            description: None,
        };
        let c = candidate(vec![Clause::new("Limitation of Liability", "Capped at fees paid.")]);
        assert!(check_mandatory(&rule, &c, "Data Processing Agreement").is_none());

        let missing = candidate(vec![Clause::new("Term", "Two years.")]);
        let v = check_mandatory(&rule, &missing, "Data Processing Agreement").unwrap();
        assert_eq!(v.field, "mandatory_clause.liability_cap");
        assert_eq!(v.suggestion, "Add a liability cap clause.");
    }

    #[test]
    fn test_mandatory_skipped_for_other_contract_types() {
        let rule = MandatoryClause {
            category: "liability_cap".to_string(),
            markers: vec!["liability cap".to_string()],
            contract_types: vec!["Master Services Agreement".to_string()],
            description: None,
        };
        let c = candidate(vec![Clause::new("Term", "Two years.")]);
        assert!(check_mandatory(&rule, &c, "Privacy Policy").is_none());
    }

    #[test]
    fn test_unresolved_citation_counts_by_default() {
        let rule = CitationCount {
            min_distinct: 2,
            ..Default::default()
        };
        let c = candidate(vec![Clause::new("A", "a").cite("DPA-7.1", "").cite("FAKE-1", "")]);
        let resolver = KnownIds(vec!["DPA-7.1"]);
        assert!(check_citations(&rule, &c, Some(&resolver)).is_empty());
    }

    #[test]
    fn test_strict_citation_excludes_unresolved() {
        let rule = CitationCount {
            min_distinct: 2,
            strict: true,
            ..Default::default()
        };
        let c = candidate(vec![Clause::new("A", "a").cite("DPA-7.1", "").cite("FAKE-1", "")]);
        let resolver = KnownIds(vec!["DPA-7.1"]);
        let violations = check_citations(&rule, &c, Some(&resolver));
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["citations.FAKE-1", "citations"]);
    }

    #[test]
    fn test_required_ids_and_per_clause() {
        let rule = CitationCount {
            min_distinct: 0,
            required_ids: vec!["Priv-4.1".to_string(), "Priv-6.1".to_string()],
            require_per_clause: true,
            strict: false,
        };
        let c = candidate(vec![
            Clause::new("A", "a").cite("Priv-4.1", ""),
            Clause::new("B", "b"),
        ]);
        let violations = check_citations(&rule, &c, None);
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["required_citations.Priv-6.1", "clauses[1].citations"]);
        assert!(violations.iter().all(|v| v.severity == Severity::Medium));
    }

    #[test]
    fn test_confidence_floor() {
        let rule = ConfidenceFloor { floor: 0.9 };
        let c = candidate(vec![Clause::new("A", "a")]);
        let v = check_confidence(&rule, &c).unwrap();
        assert_eq!(v.severity, Severity::Low);
        assert!(check_confidence(&ConfidenceFloor { floor: 0.8 }, &c).is_none());
    }

    #[test]
    fn test_clause_length_flags_only_long_clauses() {
        let rule = ClauseLength { max_words: 5 };
        let c = candidate(vec![
            Clause::new("Term", "This agreement runs two years."),
            Clause::new("Liability", "The Processor's aggregate liability is capped at fees paid."),
        ]);
        let violations = check_clause_length(&rule, &c);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "clauses[1].length");
        assert_eq!(violations[0].severity, Severity::Low);
        assert!(violations[0].message.contains("9 words"));
    }
}
