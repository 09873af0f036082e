//! Declarative mappings between node fields and workflow variables.
//!
//! Mapping records are owned by the node configuration and deserialized
//! from it at execution time; the pipeline never persists its own copy.

pub mod pipeline;

use serde::{Deserialize, Serialize};

pub use pipeline::MappingPipeline;

/// Moves a variable into a node input field before the node executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMapping {
    #[serde(default)]
    pub id: String,
    pub source_variable: String,
    pub target_field: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub transformation: Option<String>,
}

impl InputMapping {
    /// Valid iff both identifiers are non-empty. Invalid mappings stay in
    /// configuration so the user can fix them; execution skips them with a
    /// warning diagnostic.
    pub fn is_valid(&self) -> bool {
        !self.source_variable.trim().is_empty() && !self.target_field.trim().is_empty()
    }
}

/// Moves a node output field into a workflow variable after the node
/// executes. `source_field` may be a dotted path, e.g. `output.id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMapping {
    #[serde(default)]
    pub id: String,
    pub source_field: String,
    pub target_variable: String,
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
    #[serde(default)]
    pub transformation: Option<String>,
}

fn default_create_if_missing() -> bool {
    true
}

impl OutputMapping {
    pub fn is_valid(&self) -> bool {
        !self.source_field.trim().is_empty() && !self.target_variable.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_mapping_from_config_json() {
        let mapping: InputMapping = serde_json::from_value(json!({
            "id": "m1",
            "source_variable": "amount",
            "target_field": "threshold"
        }))
        .unwrap();
        assert!(!mapping.required);
        assert!(mapping.transformation.is_none());
        assert!(mapping.is_valid());
    }

    #[test]
    fn test_output_mapping_create_if_missing_defaults_true() {
        let mapping: OutputMapping = serde_json::from_value(json!({
            "source_field": "output.id",
            "target_variable": "lastId"
        }))
        .unwrap();
        assert!(mapping.create_if_missing);
    }

    #[test]
    fn test_blank_identifiers_are_invalid() {
        let mapping: InputMapping = serde_json::from_value(json!({
            "source_variable": "  ",
            "target_field": "x"
        }))
        .unwrap();
        assert!(!mapping.is_valid());

        let mapping: OutputMapping = serde_json::from_value(json!({
            "source_field": "a",
            "target_variable": ""
        }))
        .unwrap();
        assert!(!mapping.is_valid());
    }
}
