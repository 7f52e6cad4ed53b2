//! Preset registry.
//!
//! A preset bundles a constraint set with a default contract type and
//! jurisdiction. The registry is built once at startup (the embedded
//! built-in bundle plus any operator-supplied files) and is read-only
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::constraints::{
    CitationCount, ConstraintError, ConstraintSet, ForbiddenPattern, JurisdictionRule,
    MandatoryClause, Rule,
};

/// Built-in preset bundle (embedded at compile time).
const BUILTIN_PRESETS_YAML: &str = include_str!("../presets/builtin.yaml");

/// Contract types that always need a liability cap when no preset is named.
const LIABILITY_CAP_CONTRACT_TYPES: &[&str] = &[
    "Data Processing Agreement",
    "Master Services Agreement",
    "Service Level Agreement",
];

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Unknown preset '{name}' (available: {available})")]
    NotFound { name: String, available: String },
}

/// A named constraint profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Contract type the preset is written for
    pub contract_type: String,

    /// Jurisdiction the preset is written for
    pub jurisdiction: String,

    pub constraints: ConstraintSet,
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    presets: Vec<Preset>,
}

/// Immutable lookup table of presets, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Preset>,
}

impl PresetRegistry {
    /// Registry holding only the embedded presets.
    pub fn builtin() -> Result<Self, ConstraintError> {
        Self::from_yaml(BUILTIN_PRESETS_YAML)
    }

    /// Parse a preset file (`presets: [...]`).
    pub fn from_yaml(yaml: &str) -> Result<Self, ConstraintError> {
        let file: PresetFile = serde_yaml::from_str(yaml)?;
        let mut presets = BTreeMap::new();
        for preset in file.presets {
            let key = normalize(&preset.name);
            if key.is_empty() {
                return Err(ConstraintError::MissingField("presets[].name".to_string()));
            }
            if presets.contains_key(&key) {
                return Err(ConstraintError::ValidationError(format!(
                    "duplicate preset '{}'",
                    preset.name
                )));
            }
            presets.insert(key, preset);
        }
        Ok(Self { presets })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConstraintError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Merge another registry in; its presets replace ours by name.
    pub fn merge(mut self, other: PresetRegistry) -> Self {
        self.presets.extend(other.presets);
        self
    }

    /// Look up a preset by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Result<&Preset, PresetError> {
        self.presets
            .get(&normalize(name))
            .ok_or_else(|| PresetError::NotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// The constraint set of a named preset.
    pub fn lookup_constraints(&self, name: &str) -> Result<&ConstraintSet, PresetError> {
        self.lookup(name).map(|p| &p.constraints)
    }

    /// Preset names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.presets.values().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Constraints derived from a request that names no preset.
    ///
    /// Whitelists the requested jurisdiction, forbids unlimited liability,
    /// demands one citation, and requires a liability cap for the contract
    /// types that carry one.
    pub fn fallback(contract_type: &str, jurisdiction: &str) -> Result<ConstraintSet, ConstraintError> {
        let mut rules = vec![
            Rule::Jurisdiction(JurisdictionRule {
                allowed: vec![jurisdiction.to_string()],
            }),
            Rule::ForbiddenPattern(ForbiddenPattern::new(
                r"(?i)unlimited\s+liability",
                "Unlimited liability is not acceptable.",
            )?),
            Rule::CitationCount(CitationCount {
                min_distinct: 1,
                ..Default::default()
            }),
        ];

        let needs_cap = LIABILITY_CAP_CONTRACT_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(contract_type.trim()));
        if needs_cap {
            rules.push(Rule::MandatoryClause(MandatoryClause {
                category: "liability_cap".to_string(),
                markers: vec![
                    "limitation of liability".to_string(),
                    "liability cap".to_string(),
                    "cap on liability".to_string(),
                    "aggregate liability".to_string(),
                ],
                contract_types: Vec::new(),
                description: Some("a liability cap clause".to_string()),
            }));
        }

        ConstraintSet::new(rules)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::CheckPhase;
    use crate::types::Severity;

    #[test]
    fn test_builtin_presets_load() {
        let registry = PresetRegistry::builtin().unwrap();
        assert_eq!(registry.names(), vec!["dpa", "msa", "privacy"]);

        let dpa = registry.lookup("dpa").unwrap();
        assert_eq!(dpa.jurisdiction, "European Union");
        assert_eq!(dpa.constraints.min_distinct_citations(), 3);
        assert_eq!(dpa.constraints.forbidden_patterns().count(), 4);
        assert_eq!(dpa.constraints.max_clause_words(), Some(500));
    }

    #[test]
    fn test_dpa_and_msa_exclude_consequential_damages_and_require_gdpr() {
        let registry = PresetRegistry::builtin().unwrap();
        for name in ["dpa", "msa"] {
            let constraints = &registry.lookup(name).unwrap().constraints;
            let damages = constraints
                .forbidden_patterns()
                .find(|p| p.is_match("liable for consequential damages"))
                .unwrap();
            assert_eq!(damages.severity, Severity::High);
            assert!(constraints
                .mandatory_clauses()
                .any(|m| m.category == "gdpr_reference"));
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PresetRegistry::builtin().unwrap();
        assert_eq!(registry.lookup("MSA").unwrap().jurisdiction, "Sweden");
        assert_eq!(registry.lookup(" Privacy ").unwrap().name, "privacy");
    }

    #[test]
    fn test_unknown_preset_not_found() {
        let registry = PresetRegistry::builtin().unwrap();
        let err = registry.lookup("nda").unwrap_err();
        match err {
            PresetError::NotFound { name, available } => {
                assert_eq!(name, "nda");
                assert_eq!(available, "dpa, msa, privacy");
            }
        }
    }

    #[test]
    fn test_merge_replaces_by_name() {
        let custom = PresetRegistry::from_yaml(
            r#"
presets:
  - name: MSA
    contract_type: "Master Services Agreement"
    jurisdiction: "Norway"
    constraints:
      rules:
        - kind: jurisdiction
          allowed: ["Norway"]
  - name: sla
    contract_type: "Service Level Agreement"
    jurisdiction: "Sweden"
    constraints:
      rules: []
"#,
        )
        .unwrap();
        let registry = PresetRegistry::builtin().unwrap().merge(custom);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lookup("msa").unwrap().jurisdiction, "Norway");
        assert!(registry.lookup("sla").is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = PresetRegistry::from_yaml(
            r#"
presets:
  - name: a
    contract_type: "X"
    jurisdiction: "Y"
    constraints: {}
  - name: A
    contract_type: "X"
    jurisdiction: "Y"
    constraints: {}
"#,
        );
        assert!(matches!(result, Err(ConstraintError::ValidationError(_))));
    }

    #[test]
    fn test_fallback_requires_cap_for_msa_only() {
        let msa = PresetRegistry::fallback("Master Services Agreement", "Sweden").unwrap();
        assert_eq!(msa.mandatory_clauses().count(), 1);
        assert_eq!(msa.allowed_jurisdictions(), vec!["Sweden"]);
        assert_eq!(msa.rules().last().map(Rule::phase), Some(CheckPhase::CitationCount));

        let privacy = PresetRegistry::fallback("Privacy Policy", "European Union").unwrap();
        assert_eq!(privacy.mandatory_clauses().count(), 0);
        assert_eq!(privacy.min_distinct_citations(), 1);
    }
}
