use serde::Serialize;

/// Classification of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An interpolation token had no matching variable.
    UnresolvedVariable,
    /// A transformation expression named a function not in the registry.
    UnknownTransformation,
    /// A mapping is missing its source or target identifier.
    IncompleteMapping,
    /// A `required` input mapping found no variable. Blocking-eligible.
    RequiredVariableMissing,
    /// A lenient coercion produced a sentinel (e.g. `toNumber` → NaN).
    CoercionFailed,
    /// An output mapping's source field did not resolve in the node result.
    MissingSourceField,
    /// The store refused a mapped write (quota).
    WriteRejected,
}

/// A non-fatal note describing a skipped, incomplete, or soft-failed
/// operation. Diagnostics are aggregated per batch and returned alongside
/// the primary result; they never abort the batch.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Id of the mapping that produced this diagnostic, when applicable.
    pub mapping_id: Option<String>,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            mapping_id: None,
            detail: detail.into(),
        }
    }

    pub fn for_mapping(kind: DiagnosticKind, mapping_id: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            mapping_id: Some(mapping_id.to_string()),
            detail: detail.into(),
        }
    }

    /// Attach a mapping id to a diagnostic raised below the mapping layer
    /// (interpolation, coercion), leaving an existing id untouched.
    pub fn with_mapping_id(mut self, id: &str) -> Self {
        if self.mapping_id.is_none() {
            self.mapping_id = Some(id.to_string());
        }
        self
    }

    /// Whether the scheduler may treat this diagnostic as blocking.
    /// Only a required-input miss qualifies; the decision itself belongs
    /// to the scheduler.
    pub fn is_blocking(&self) -> bool {
        self.kind == DiagnosticKind::RequiredVariableMissing
    }
}
