//! # covenant-core
//!
//! Deterministic constraint engine for drafted contract clauses.
//!
//! This crate answers one question about a drafted clause set: does it
//! satisfy the constraint profile it was drafted for?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same candidate and constraints, same ordered violations
//! 2. **No LLM calls**: every check is rule-based
//! 3. **Immutable profiles**: presets and the citation corpus are read-only once loaded
//!
//! ## Example
//!
//! ```rust,ignore
//! use covenant_core::{PresetRegistry, validate};
//!
//! let registry = PresetRegistry::builtin()?;
//! let preset = registry.lookup("dpa")?;
//! let result = validate(&candidate, &preset.constraints, &preset.contract_type);
//!
//! for violation in &result.violations {
//!     println!("[{}] {}: {}", violation.severity.label(), violation.field, violation.message);
//! }
//! ```

pub mod constraints;
pub mod corpus;
pub mod presets;
pub mod schema;
pub mod types;
pub mod validator;

// Re-export main types at crate root
pub use constraints::{
    CheckPhase, CitationCount, ClauseLength, ConfidenceFloor, ConstraintError, ConstraintSet,
    ForbiddenPattern, JurisdictionRule, MandatoryClause, Rule,
};
pub use corpus::{CitationCorpus, CitationEntry, CorpusError, DocumentChunk, DocumentMetadata};
pub use presets::{Preset, PresetError, PresetRegistry};
pub use schema::{parse_candidate, validate_candidate_schema, SchemaError};
pub use types::{
    CandidateOutput, CitationRef, Clause, RiskLevel, Severity, ValidationResult, Violation,
};
pub use validator::{validate, CitationResolver, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS_DOC: &str = "# Data Processing Agreement

## 7. Liability

[SourceID: DPA-7.1] Aggregate liability is capped at the fees paid.
";

    #[test]
    fn test_strict_citations_against_corpus() {
        let corpus = CitationCorpus::from_documents([("legora_dpa.md", CORPUS_DOC)]).unwrap();
        let set = ConstraintSet::new(vec![Rule::CitationCount(CitationCount {
            min_distinct: 1,
            strict: true,
            ..Default::default()
        })])
        .unwrap();

        let grounded = CandidateOutput {
            clauses: vec![Clause::new("Cap", "Capped.").cite("DPA-7.1", "cap")],
            summary: String::new(),
            governing_jurisdiction: "European Union".to_string(),
            confidence_score: 0.9,
        };
        let invented = CandidateOutput {
            clauses: vec![Clause::new("Cap", "Capped.").cite("DPA-99.9", "made up")],
            ..grounded.clone()
        };

        let validator = Validator::new().with_resolver(&corpus);
        assert!(validator.validate(&grounded, &set, "Data Processing Agreement").is_valid);

        let result = validator.validate(&invented, &set, "Data Processing Agreement");
        assert!(!result.is_valid);
        assert_eq!(result.violations.len(), 2);
        assert_eq!(result.violations[0].field, "citations.DPA-99.9");
    }
}
