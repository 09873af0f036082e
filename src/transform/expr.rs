use crate::core::store::VariableStore;
use crate::core::value::VarValue;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::template::interpolate;
use crate::transform::registry::TransformRegistry;

/// Evaluate a transformation expression: zero or more nested function
/// calls around one template, e.g. `toUpperCase(trim(${customer}))`.
///
/// Evaluation interpolates the template first, then applies the functions
/// innermost-out. An empty template applies the chain to `source` — the
/// value the owning mapping already resolved — so a bare `toUpperCase()`
/// works without restating the variable.
///
/// Returns `None` when any named function is unknown; per the failure
/// policy the owning mapping then writes null and records the diagnostic,
/// without aborting the batch. Soft coercion failures (NaN sentinel) keep
/// their value and add a `CoercionFailed` diagnostic.
pub fn apply_expression(
    expr: &str,
    source: &VarValue,
    store: &VariableStore,
    node_id: Option<&str>,
    registry: &TransformRegistry,
) -> (Option<VarValue>, Vec<Diagnostic>) {
    let (names, core) = parse_call_chain(expr);

    for name in &names {
        if !registry.contains(name) {
            let diag = Diagnostic::new(
                DiagnosticKind::UnknownTransformation,
                format!("unknown transformation '{}'", name),
            );
            return (None, vec![diag]);
        }
    }

    let (mut value, mut diagnostics) = if core.is_empty() {
        (source.clone(), Vec::new())
    } else {
        interpolate(core, store, node_id)
    };

    for name in names.iter().rev() {
        // Names were validated above, so apply always hits the table.
        if let Some(outcome) = registry.apply(name, &value) {
            value = outcome.value;
            if let Some(detail) = outcome.soft_failure {
                diagnostics.push(Diagnostic::new(DiagnosticKind::CoercionFailed, detail));
            }
        }
    }
    (Some(value), diagnostics)
}

/// Split `a(b(core))` into the call names, outermost first, and the core
/// template. Stops peeling as soon as the remainder is not a single
/// well-formed `name(...)` wrapper.
fn parse_call_chain(expr: &str) -> (Vec<&str>, &str) {
    let mut names = Vec::new();
    let mut rest = expr.trim();
    loop {
        let Some(open) = rest.find('(') else { break };
        let name = rest[..open].trim();
        if name.is_empty() || !is_identifier(name) || !rest.ends_with(')') {
            break;
        }
        names.push(name);
        rest = rest[open + 1..rest.len() - 1].trim();
    }
    (names, rest)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
