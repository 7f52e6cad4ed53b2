//! JSON Schema for drafter output.
//!
//! Drafters that produce free text (LLMs) are checked against
//! `schema/candidate_output.schema.json` before deserialization, so a
//! structurally broken response becomes a clean `Malformed` failure.

use std::sync::OnceLock;
use thiserror::Error;

use crate::types::CandidateOutput;

/// Embedded candidate schema (loaded at compile time).
pub const CANDIDATE_SCHEMA_JSON: &str = include_str!("../schema/candidate_output.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),

    #[error("Output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output does not match the candidate schema: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(CANDIDATE_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Check a JSON value against the candidate schema.
pub fn validate_candidate_schema(value: &serde_json::Value) -> Result<(), SchemaError> {
    let validator = get_validator()?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Invalid(errors))
    }
}

/// Parse raw JSON text, check it against the schema, and deserialize.
pub fn parse_candidate(raw: &str) -> Result<CandidateOutput, SchemaError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    validate_candidate_schema(&value)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> serde_json::Value {
        json!({
            "clauses": [{
                "title": "Limitation of Liability",
                "text": "Liability is capped at fees paid.",
                "citations": [{"source_id": "DPA-7.1", "relevance": "cap"}],
                "risk_level": "medium",
                "reasoning": "Mirrors the source."
            }],
            "summary": "One clause.",
            "governing_jurisdiction": "European Union",
            "confidence_score": 0.8
        })
    }

    #[test]
    fn test_valid_candidate_passes() {
        assert!(validate_candidate_schema(&valid()).is_ok());
        let parsed = parse_candidate(&valid().to_string()).unwrap();
        assert_eq!(parsed.clauses[0].citations[0].source_id, "DPA-7.1");
    }

    #[test]
    fn test_empty_clauses_fail() {
        let mut value = valid();
        value["clauses"] = json!([]);
        assert!(matches!(
            validate_candidate_schema(&value),
            Err(SchemaError::Invalid(_))
        ));
    }

    #[test]
    fn test_confidence_out_of_range_fails() {
        let mut value = valid();
        value["confidence_score"] = json!(1.5);
        assert!(validate_candidate_schema(&value).is_err());
    }

    #[test]
    fn test_unknown_risk_level_fails() {
        let mut value = valid();
        value["clauses"][0]["risk_level"] = json!("extreme");
        assert!(validate_candidate_schema(&value).is_err());
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(parse_candidate("Sure! Here you go"), Err(SchemaError::Json(_))));
    }
}
