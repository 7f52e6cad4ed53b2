//! Corrective instructions injected into the next drafting attempt.

use covenant_core::{Severity, Violation};

/// Field used for the implicit violation of a failed draft.
pub const GENERATION_FIELD: &str = "generation";

/// Directive used when no violation carries a suggestion.
const GENERIC_FIX: &str = "Review and correct the violations.";

/// The violation recorded when a drafting call returned no candidate.
///
/// Carries no provider detail; the underlying error is logged instead.
pub fn generation_failure_violation() -> Violation {
    Violation::new(
        GENERATION_FIELD,
        "The previous attempt did not produce a usable structured response.",
        Severity::High,
        "Respond with a single JSON object that matches the required output schema exactly, with no surrounding text.",
    )
}

/// A drafting directive for one violation.
///
/// Uses the violation's own suggestion when present, otherwise derives one
/// from the field it applies to.
pub fn directive(violation: &Violation) -> String {
    let suggestion = violation.suggestion.trim();
    if !suggestion.is_empty() {
        return suggestion.to_string();
    }

    let field = violation.field.as_str();
    if let Some(category) = field.strip_prefix("mandatory_clause.") {
        format!("Add a {} clause.", category.replace('_', " "))
    } else if let Some(id) = field.strip_prefix("required_citations.") {
        format!("Include a citation to [SourceID: {}] in your response.", id)
    } else if let Some(id) = field.strip_prefix("citations.") {
        format!("Remove the citation '{}'; cite only sources from the provided context.", id)
    } else if field == "citations" {
        "Cite more distinct sources from the provided context.".to_string()
    } else if field == "governing_jurisdiction" {
        "Set governing_jurisdiction to an allowed jurisdiction.".to_string()
    } else if field == "confidence_score" {
        "Only draft clauses you can support with the provided sources.".to_string()
    } else if field.starts_with("clauses[") {
        format!("Revise {} to resolve: {}", field, violation.message)
    } else {
        format!("Fix {}: {}", field, violation.message)
    }
}

/// Build the addendum for the attempt after `attempt`.
pub fn build_addendum(violations: &[Violation], attempt: u32) -> String {
    let summary = violations
        .iter()
        .map(|v| format!("- [{}] {}: {}", v.severity.label(), v.field, v.message))
        .collect::<Vec<_>>()
        .join("\n");

    let mut fixes: Vec<String> = Vec::new();
    for fix in violations.iter().map(directive) {
        if !fixes.contains(&fix) {
            fixes.push(fix);
        }
    }
    let fixes = if fixes.is_empty() {
        GENERIC_FIX.to_string()
    } else {
        fixes
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "YOUR PREVIOUS ATTEMPT (attempt {attempt}) WAS REJECTED. You must fix the following violations:\n\n\
         {summary}\n\n\
         SPECIFIC FIXES REQUIRED:\n\
         {fixes}\n\n\
         Generate a CORRECTED version that addresses ALL violations above.\n\
         Maintain the same JSON schema."
    )
}
