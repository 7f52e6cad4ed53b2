//! Prompts for LLM-backed drafting.
//!
//! The system prompt is identical on every attempt of a session (rules,
//! schema, constraint profile, source context), so providers with prompt
//! caching only pay for it once. Corrections go into the user prompt.

use covenant_core::ConstraintSet;

use crate::drafter::DraftRequest;
use crate::retrieval::CitationSnippet;

/// Fixed preamble of every system prompt.
pub const BASE_SYSTEM_PROMPT: &str = r#"You are a legal drafting assistant.
Your task is to draft legally precise contract clauses from the provided source context and constraints.

CRITICAL RULES:
1. You MUST output a single valid JSON object conforming to the schema below. No prose, no code fences.
2. You MUST cite sources using only the SourceIDs that appear in the source context.
3. You MUST respect the governing jurisdiction given below.
4. You MUST NOT include any forbidden clause patterns.
5. Set confidence_score to how well your output satisfies the constraint profile.
"#;

const OUTPUT_SCHEMA_TEMPLATE: &str = r#"OUTPUT JSON SCHEMA:
{
    "clauses": [
        {
            "title": "string - clause heading",
            "text": "string - the clause text",
            "citations": [{"source_id": "string", "relevance": "string"}],
            "risk_level": "low|medium|high|critical",
            "reasoning": "string - why you drafted it this way"
        }
    ],
    "summary": "string - brief summary",
    "governing_jurisdiction": "{jurisdiction}",
    "confidence_score": 0.0-1.0
}
"#;

/// Full system prompt for a drafting request.
pub fn system_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);
    prompt.push_str(&format!(
        "\nCONTRACT TYPE: {}\nGOVERNING JURISDICTION: {}\n\n",
        request.contract_type, request.jurisdiction
    ));
    prompt.push_str(&OUTPUT_SCHEMA_TEMPLATE.replace("{jurisdiction}", &request.jurisdiction));
    prompt.push_str("\nCONSTRAINT PROFILE:\n");
    prompt.push_str(&render_constraint_profile(&request.constraints));
    prompt.push_str("\nAVAILABLE SOURCE CONTEXT:\n");
    prompt.push_str(&render_context(&request.context));
    prompt
}

/// User prompt: the original instruction followed by every correction so far.
pub fn user_prompt(request: &DraftRequest) -> String {
    let mut prompt = request.prompt.trim().to_string();
    for addendum in &request.corrections {
        prompt.push_str("\n\n");
        prompt.push_str(addendum);
    }
    prompt
}

/// Human-readable rendering of a constraint set.
pub fn render_constraint_profile(constraints: &ConstraintSet) -> String {
    let mut lines = Vec::new();

    let allowed = constraints.allowed_jurisdictions();
    if !allowed.is_empty() {
        lines.push(format!("- Allowed jurisdictions: {}", allowed.join(", ")));
    }
    for pattern in constraints.forbidden_patterns() {
        if pattern.reason.is_empty() {
            lines.push(format!("- Forbidden: text matching `{}`", pattern.pattern));
        } else {
            lines.push(format!(
                "- Forbidden: text matching `{}` ({})",
                pattern.pattern, pattern.reason
            ));
        }
    }
    for clause in constraints.mandatory_clauses() {
        lines.push(format!(
            "- Required: {} (use one of: {})",
            clause.display_name(),
            clause.markers.join(", ")
        ));
    }
    for citations in constraints.citation_requirements() {
        if citations.min_distinct > 0 {
            lines.push(format!(
                "- Cite at least {} distinct sources",
                citations.min_distinct
            ));
        }
        if !citations.required_ids.is_empty() {
            lines.push(format!(
                "- Must cite: {}",
                citations.required_ids.join(", ")
            ));
        }
        if citations.require_per_clause {
            lines.push("- Every clause must carry at least one citation".to_string());
        }
    }
    for floor in constraints.confidence_floors() {
        lines.push(format!("- Minimum confidence_score: {}", floor.floor));
    }
    if let Some(max_words) = constraints.max_clause_words() {
        lines.push(format!("- Each clause must be under {} words", max_words));
    }

    if lines.is_empty() {
        "(no constraints)\n".to_string()
    } else {
        lines.join("\n") + "\n"
    }
}

/// Source context, one block per snippet.
pub fn render_context(context: &[CitationSnippet]) -> String {
    if context.is_empty() {
        return "(no source context available)\n".to_string();
    }
    context
        .iter()
        .map(|s| format!("[Sources: {}]\n{}\n", s.source_ids.join(", "), s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::PresetRegistry;
    use std::sync::Arc;

    fn request(corrections: Vec<String>) -> DraftRequest {
        let registry = PresetRegistry::builtin().unwrap();
        DraftRequest {
            prompt: "Draft a limitation of liability clause".to_string(),
            contract_type: "Data Processing Agreement".to_string(),
            jurisdiction: "European Union".to_string(),
            context: vec![CitationSnippet::new(
                vec!["DPA-7.1".to_string()],
                "Aggregate liability is capped at the fees paid.",
                "legora_dpa",
            )],
            corrections,
            constraints: Arc::new(registry.lookup_constraints("dpa").unwrap().clone()),
            attempt: 1,
        }
    }

    #[test]
    fn test_system_prompt_sections() {
        let prompt = system_prompt(&request(Vec::new()));
        assert!(prompt.starts_with("You are a legal drafting assistant."));
        assert!(prompt.contains("\"governing_jurisdiction\": \"European Union\""));
        assert!(prompt.contains("- Allowed jurisdictions: European Union"));
        assert!(prompt.contains("- Must cite: DPA-7.1, DPA-6.2, DPA-9.1"));
        assert!(prompt.contains("- Each clause must be under 500 words"));
        assert!(prompt.contains("(Consequential damages are excluded by this profile.)"));
        assert!(prompt.contains("[Sources: DPA-7.1]\nAggregate liability"));
    }

    #[test]
    fn test_system_prompt_stable_across_attempts() {
        let first = request(Vec::new());
        let mut second = request(vec!["YOUR PREVIOUS ATTEMPT WAS REJECTED.".to_string()]);
        second.attempt = 2;
        assert_eq!(system_prompt(&first), system_prompt(&second));
    }

    #[test]
    fn test_user_prompt_accumulates_corrections() {
        let prompt = user_prompt(&request(vec!["first fix".to_string(), "second fix".to_string()]));
        assert!(prompt.starts_with("Draft a limitation of liability clause"));
        let first = prompt.find("first fix").unwrap();
        let second = prompt.find("second fix").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_profile_and_context() {
        assert_eq!(render_constraint_profile(&ConstraintSet::empty()), "(no constraints)\n");
        assert!(render_context(&[]).contains("no source context"));
    }
}
