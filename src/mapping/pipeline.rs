use serde_json::Value;
use tracing::warn;

use crate::core::cancel::CancelSignal;
use crate::core::store::{Scope, VariableStore};
use crate::core::value::VarValue;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::mapping::{InputMapping, OutputMapping};
use crate::transform::{apply_expression, TransformRegistry};

/// Node input payload assembled by the pipeline. Fields that did not
/// resolve are simply absent.
pub type Payload = serde_json::Map<String, Value>;

/// Applies a node's mappings against the variable store.
///
/// Every element of a batch is attempted in declaration order and all
/// diagnostics are aggregated; a malformed element never aborts the batch.
/// When several output mappings write the same target variable, the last
/// one in declared order wins. The scheduler decides whether blocking
/// diagnostics (required-input misses) halt node execution.
pub struct MappingPipeline<'a> {
    store: &'a VariableStore,
    registry: &'a TransformRegistry,
    cancel: Option<CancelSignal>,
}

impl<'a> MappingPipeline<'a> {
    pub fn new(store: &'a VariableStore, registry: &'a TransformRegistry) -> Self {
        Self {
            store,
            registry,
            cancel: None,
        }
    }

    /// Attach the instance's cancellation signal. Once triggered, the
    /// pipeline stops before the next element; committed elements stand.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_triggered())
    }

    /// Resolve all input mappings for a node, producing its effective
    /// input payload plus diagnostics.
    pub fn apply_input_mappings(
        &self,
        node_id: &str,
        mappings: &[InputMapping],
    ) -> (Payload, Vec<Diagnostic>) {
        let mut payload = Payload::new();
        let mut diagnostics = Vec::new();

        for mapping in mappings {
            if self.cancelled() {
                break;
            }
            if !mapping.is_valid() {
                warn!(mapping = %mapping.id, node = node_id, "skipping incomplete input mapping");
                diagnostics.push(Diagnostic::for_mapping(
                    DiagnosticKind::IncompleteMapping,
                    &mapping.id,
                    "input mapping is missing its source variable or target field",
                ));
                continue;
            }

            let Some(value) = self.store.resolve(&mapping.source_variable, Some(node_id)) else {
                if mapping.required {
                    diagnostics.push(Diagnostic::for_mapping(
                        DiagnosticKind::RequiredVariableMissing,
                        &mapping.id,
                        format!("required variable '{}' not found", mapping.source_variable),
                    ));
                }
                // Optional miss: skip silently, field stays absent.
                continue;
            };

            match &mapping.transformation {
                Some(expr) => {
                    let (transformed, diags) =
                        apply_expression(expr, &value, self.store, Some(node_id), self.registry);
                    for diag in diags {
                        diagnostics.push(diag.with_mapping_id(&mapping.id));
                    }
                    let value = transformed.unwrap_or(VarValue::Null);
                    payload.insert(mapping.target_field.clone(), value.to_json());
                }
                None => {
                    payload.insert(mapping.target_field.clone(), value.to_json());
                }
            }
        }
        (payload, diagnostics)
    }

    /// Write a node's result fields back into workflow-scoped variables.
    pub fn apply_output_mappings(
        &self,
        node_id: &str,
        node_result: &Value,
        mappings: &[OutputMapping],
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for mapping in mappings {
            if self.cancelled() {
                break;
            }
            if !mapping.is_valid() {
                warn!(mapping = %mapping.id, node = node_id, "skipping incomplete output mapping");
                diagnostics.push(Diagnostic::for_mapping(
                    DiagnosticKind::IncompleteMapping,
                    &mapping.id,
                    "output mapping is missing its source field or target variable",
                ));
                continue;
            }

            let value = match resolve_field(node_result, &mapping.source_field) {
                Some(raw) => {
                    let resolved = VarValue::from_json(raw);
                    match &mapping.transformation {
                        Some(expr) => {
                            let (transformed, diags) = apply_expression(
                                expr,
                                &resolved,
                                self.store,
                                Some(node_id),
                                self.registry,
                            );
                            for diag in diags {
                                diagnostics.push(diag.with_mapping_id(&mapping.id));
                            }
                            transformed.unwrap_or(VarValue::Null)
                        }
                        None => resolved,
                    }
                }
                None if mapping.create_if_missing => {
                    diagnostics.push(Diagnostic::for_mapping(
                        DiagnosticKind::MissingSourceField,
                        &mapping.id,
                        format!(
                            "field '{}' not found in node result; wrote null",
                            mapping.source_field
                        ),
                    ));
                    VarValue::Null
                }
                None => {
                    diagnostics.push(Diagnostic::for_mapping(
                        DiagnosticKind::MissingSourceField,
                        &mapping.id,
                        format!(
                            "field '{}' not found in node result; mapping skipped",
                            mapping.source_field
                        ),
                    ));
                    continue;
                }
            };

            let description = format!("output mapping from node {}", node_id);
            if let Err(e) = self.store.set_described(
                Scope::Workflow,
                &mapping.target_variable,
                value,
                Some(&description),
            ) {
                warn!(
                    mapping = %mapping.id,
                    variable = %mapping.target_variable,
                    error = %e,
                    "store rejected mapped write"
                );
                diagnostics.push(Diagnostic::for_mapping(
                    DiagnosticKind::WriteRejected,
                    &mapping.id,
                    e.to_string(),
                ));
            }
        }
        diagnostics
    }
}

/// Navigate a dotted path through a node result: object members and array
/// indices. Any miss, or path remaining at a scalar, resolves to `None`.
fn resolve_field<'v>(result: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = result;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::InstanceContext;
    use serde_json::json;

    fn store() -> VariableStore {
        VariableStore::new(InstanceContext::new("wf"))
    }

    fn input(id: &str, source: &str, target: &str) -> InputMapping {
        InputMapping {
            id: id.to_string(),
            source_variable: source.to_string(),
            target_field: target.to_string(),
            required: false,
            transformation: None,
        }
    }

    fn output(id: &str, source: &str, target: &str) -> OutputMapping {
        OutputMapping {
            id: id.to_string(),
            source_field: source.to_string(),
            target_variable: target.to_string(),
            create_if_missing: true,
            transformation: None,
        }
    }

    #[test]
    fn test_input_mapping_assembles_payload() {
        let store = store();
        store
            .set(Scope::Workflow, "amount", VarValue::Number(1500.0))
            .unwrap();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let (payload, diagnostics) =
            pipeline.apply_input_mappings("decision", &[input("m1", "amount", "threshold")]);
        assert_eq!(payload.get("threshold"), Some(&json!(1500.0)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_required_miss_produces_single_blocking_diagnostic() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let mut mapping = input("m1", "absent", "field");
        mapping.required = true;
        let (payload, diagnostics) = pipeline.apply_input_mappings("n1", &[mapping]);

        assert!(!payload.contains_key("field"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RequiredVariableMissing);
        assert!(diagnostics[0].is_blocking());
    }

    #[test]
    fn test_optional_miss_is_silent() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let (payload, diagnostics) = pipeline.apply_input_mappings("n1", &[input("m1", "absent", "field")]);
        assert!(payload.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_incomplete_mapping_skipped_not_blocking() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let (payload, diagnostics) = pipeline.apply_input_mappings("n1", &[input("m1", "", "field")]);
        assert!(payload.is_empty());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::IncompleteMapping);
        assert!(!diagnostics[0].is_blocking());
    }

    #[test]
    fn test_input_transformation_applies() {
        let store = store();
        store
            .set(Scope::Workflow, "name", VarValue::String("  ada  ".into()))
            .unwrap();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let mut mapping = input("m1", "name", "who");
        mapping.transformation = Some("toUpperCase(trim())".into());
        let (payload, diagnostics) = pipeline.apply_input_mappings("n1", &[mapping]);
        assert_eq!(payload.get("who"), Some(&json!("ADA")));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_transformation_writes_null_payload() {
        let store = store();
        store.set(Scope::Workflow, "x", VarValue::Number(1.0)).unwrap();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let mut mapping = input("m1", "x", "field");
        mapping.transformation = Some("explode()".into());
        let (payload, diagnostics) = pipeline.apply_input_mappings("n1", &[mapping]);
        assert_eq!(payload.get("field"), Some(&Value::Null));
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownTransformation);
        assert_eq!(diagnostics[0].mapping_id.as_deref(), Some("m1"));
    }

    #[test]
    fn test_output_mapping_writes_variable() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let result = json!({"output": {"approved": true}});
        let diagnostics =
            pipeline.apply_output_mappings("n1", &result, &[output("m1", "output.approved", "isApproved")]);
        assert!(diagnostics.is_empty());
        assert_eq!(
            store.get(&Scope::Workflow, "isApproved"),
            Some(VarValue::Boolean(true))
        );
        assert_eq!(store.history("isApproved").len(), 1);
    }

    #[test]
    fn test_output_mapping_is_idempotent() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let result = json!({"total": 7});
        let mappings = [output("m1", "total", "total")];
        pipeline.apply_output_mappings("n1", &result, &mappings);
        let first = store.get(&Scope::Workflow, "total");
        pipeline.apply_output_mappings("n1", &result, &mappings);
        assert_eq!(store.get(&Scope::Workflow, "total"), first);
        // each application is its own commit
        assert_eq!(store.history("total").len(), 2);
    }

    #[test]
    fn test_duplicate_targets_last_writer_wins() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let result = json!({"a": 1, "b": 2});
        let mappings = [output("A", "a", "total"), output("B", "b", "total")];
        pipeline.apply_output_mappings("n1", &result, &mappings);
        assert_eq!(store.get(&Scope::Workflow, "total"), Some(VarValue::Number(2.0)));
    }

    #[test]
    fn test_missing_field_create_if_missing_writes_null() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let diagnostics =
            pipeline.apply_output_mappings("n1", &json!({}), &[output("m1", "gone", "target")]);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingSourceField);
        assert_eq!(store.get(&Scope::Workflow, "target"), Some(VarValue::Null));
    }

    #[test]
    fn test_missing_field_without_create_skips() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let mut mapping = output("m1", "gone", "target");
        mapping.create_if_missing = false;
        let diagnostics = pipeline.apply_output_mappings("n1", &json!({}), &[mapping]);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingSourceField);
        assert!(store.get(&Scope::Workflow, "target").is_none());
    }

    #[test]
    fn test_malformed_element_never_aborts_batch() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let result = json!({"ok": "yes"});
        let mappings = [
            output("bad", "", "x"),
            output("good", "ok", "confirmed"),
        ];
        let diagnostics = pipeline.apply_output_mappings("n1", &result, &mappings);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            store.get(&Scope::Workflow, "confirmed"),
            Some(VarValue::String("yes".into()))
        );
    }

    #[test]
    fn test_cancel_stops_remaining_elements() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let cancel = CancelSignal::new();
        let pipeline = MappingPipeline::new(&store, &registry).with_cancel(cancel.clone());

        cancel.trigger();
        let result = json!({"a": 1});
        let diagnostics =
            pipeline.apply_output_mappings("n1", &result, &[output("m1", "a", "x")]);
        assert!(diagnostics.is_empty());
        assert!(store.get(&Scope::Workflow, "x").is_none());
    }

    // Cancellation raised while an element is being processed: the element
    // in flight commits, later elements are never attempted.
    static BATCH_CANCEL: std::sync::OnceLock<CancelSignal> = std::sync::OnceLock::new();

    fn trip_batch_cancel(value: &VarValue) -> crate::transform::TransformOutcome {
        if let Some(cancel) = BATCH_CANCEL.get() {
            cancel.trigger();
        }
        crate::transform::TransformOutcome {
            value: value.clone(),
            soft_failure: None,
        }
    }

    #[test]
    fn test_cancel_mid_batch_keeps_committed_elements() {
        let store = store();
        let mut registry = TransformRegistry::builtin();
        registry.register("tripCancel", trip_batch_cancel);
        let cancel = CancelSignal::new();
        BATCH_CANCEL.set(cancel.clone()).ok();
        let pipeline = MappingPipeline::new(&store, &registry).with_cancel(cancel);

        let result = json!({"a": 1, "b": 2});
        let mut first = output("m1", "a", "x");
        first.transformation = Some("tripCancel()".into());
        let mappings = [first, output("m2", "b", "y")];
        let diagnostics = pipeline.apply_output_mappings("n1", &result, &mappings);

        assert!(diagnostics.is_empty());
        // first element committed before the signal was observed
        assert_eq!(store.get(&Scope::Workflow, "x"), Some(VarValue::Number(1.0)));
        assert_eq!(store.history("x").len(), 1);
        // second element was never attempted
        assert!(store.get(&Scope::Workflow, "y").is_none());
        assert!(store.history("y").is_empty());
    }

    #[test]
    fn test_dotted_path_with_array_index() {
        let store = store();
        let registry = TransformRegistry::builtin();
        let pipeline = MappingPipeline::new(&store, &registry);

        let result = json!({"rows": [{"id": "r0"}, {"id": "r1"}]});
        pipeline.apply_output_mappings("n1", &result, &[output("m1", "rows.1.id", "lastRow")]);
        assert_eq!(
            store.get(&Scope::Workflow, "lastRow"),
            Some(VarValue::String("r1".into()))
        );
    }
}
