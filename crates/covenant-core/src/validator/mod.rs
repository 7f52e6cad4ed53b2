//! Deterministic validator.
//!
//! Evaluates a [`CandidateOutput`] against a [`ConstraintSet`]. No I/O, no
//! randomness: identical inputs always yield the identical, ordered list of
//! violations.
//!
//! ## Check order
//!
//! | Phase | Field | Severity |
//! |-------|-------|----------|
//! | jurisdiction | `governing_jurisdiction` | high |
//! | forbidden pattern | `clauses[i].text` | critical (configurable) |
//! | mandatory clause | `mandatory_clause.<category>` | critical |
//! | citation count | `citations`, `required_citations.<id>`, ... | medium |
//! | confidence floor | `confidence_score` | low |

mod checks;

use tracing::{debug, warn};

use crate::constraints::{ConstraintSet, Rule};
use crate::types::{CandidateOutput, ValidationResult, Violation};

/// Answers whether a citation source id exists in the corpus.
pub trait CitationResolver: Send + Sync {
    fn resolves(&self, source_id: &str) -> bool;
}

/// The constraint validator.
///
/// Without a resolver, strict citation checking is skipped and every cited
/// id counts toward the distinct total.
#[derive(Default, Clone, Copy)]
pub struct Validator<'r> {
    resolver: Option<&'r dyn CitationResolver>,
}

impl<'r> Validator<'r> {
    pub fn new() -> Self {
        Self { resolver: None }
    }

    /// Resolve citations against a corpus for `strict` citation rules.
    pub fn with_resolver(mut self, resolver: &'r dyn CitationResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Run every rule in check order.
    ///
    /// The returned result carries attempt number 1; the orchestrator
    /// overwrites it with the real attempt.
    pub fn validate(
        &self,
        candidate: &CandidateOutput,
        constraints: &ConstraintSet,
        contract_type: &str,
    ) -> ValidationResult {
        let mut violations: Vec<Violation> = Vec::new();

        for rule in constraints.rules() {
            match rule {
                Rule::Jurisdiction(r) => violations.extend(checks::check_jurisdiction(r, candidate)),
                Rule::ForbiddenPattern(r) => violations.extend(checks::check_forbidden(r, candidate)),
                Rule::MandatoryClause(r) => {
                    violations.extend(checks::check_mandatory(r, candidate, contract_type))
                }
                Rule::CitationCount(r) => {
                    violations.extend(checks::check_citations(r, candidate, self.resolver))
                }
                Rule::ConfidenceFloor(r) => violations.extend(checks::check_confidence(r, candidate)),
                Rule::ClauseLength(r) => {
                    violations.extend(checks::check_clause_length(r, candidate))
                }
            }
        }

        let is_valid = !violations
            .iter()
            .any(|v| constraints.invalidates(v.severity));

        if is_valid {
            debug!(
                clauses = candidate.clauses.len(),
                violations = violations.len(),
                "candidate passed validation"
            );
        } else {
            warn!(
                clauses = candidate.clauses.len(),
                violations = violations.len(),
                "candidate failed validation"
            );
        }

        ValidationResult {
            is_valid,
            violations,
            attempt_number: 1,
        }
    }
}

/// Validate with no citation resolver.
pub fn validate(
    candidate: &CandidateOutput,
    constraints: &ConstraintSet,
    contract_type: &str,
) -> ValidationResult {
    Validator::new().validate(candidate, constraints, contract_type)
}
