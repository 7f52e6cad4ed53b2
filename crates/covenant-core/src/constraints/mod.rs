//! Constraint sets: ordered bundles of deterministic rules.
//!
//! A constraint set is immutable once built. Rules are kept in check order
//! so the validator produces violations in a stable order.

mod rule;
mod set;

pub use rule::{
    CheckPhase, CitationCount, ClauseLength, ConfidenceFloor, ForbiddenPattern, JurisdictionRule,
    MandatoryClause, Rule,
};
pub use set::ConstraintSet;

use thiserror::Error;

/// Errors that can occur when loading constraint sets or presets.
#[derive(Error, Debug)]
pub enum ConstraintError {
    #[error("Failed to read constraint file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid forbidden pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Constraint validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}
