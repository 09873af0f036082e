use std::sync::OnceLock;

use regex::Regex;

use crate::core::store::VariableStore;
use crate::core::value::VarValue;
use crate::error::{Diagnostic, DiagnosticKind};

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}").unwrap()
    })
}

/// Resolve all `${name}` / `${name.path}` tokens in `text` against the
/// store, looking bare names up in the current node's scope first (when a
/// node id is given), then workflow, then global.
///
/// When the whole string is exactly one token, the variable's value is
/// returned as-is, type preserved. Otherwise each token is replaced with
/// its textual rendering inside the surrounding literal text. Unresolved
/// tokens become the empty string and record an `UnresolvedVariable`
/// diagnostic; they never abort the interpolation.
pub fn interpolate(
    text: &str,
    store: &VariableStore,
    node_id: Option<&str>,
) -> (VarValue, Vec<Diagnostic>) {
    let re = token_regex();
    let mut diagnostics = Vec::new();

    // Whole-string single token: preserve the original type.
    if let Some(m) = re.captures(text) {
        let full = m.get(0).unwrap();
        if full.start() == 0 && full.end() == text.len() {
            let path = m.get(1).unwrap().as_str();
            return match resolve_path(path, store, node_id) {
                Some(value) => (value, diagnostics),
                None => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnresolvedVariable,
                        format!("no variable matches '{}'", path),
                    ));
                    (VarValue::String(String::new()), diagnostics)
                }
            };
        }
    }

    // Mixed text: render each token, left to right.
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let full = caps.get(0).unwrap();
        let path = caps.get(1).unwrap().as_str();
        out.push_str(&text[last..full.start()]);
        match resolve_path(path, store, node_id) {
            Some(value) => out.push_str(&value.display_string()),
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedVariable,
                    format!("no variable matches '{}'", path),
                ));
            }
        }
        last = full.end();
    }
    out.push_str(&text[last..]);
    (VarValue::String(out), diagnostics)
}

/// Look up a dotted path: the first segment names a variable, the rest
/// navigate into object members and array indices. Navigating into a
/// scalar with path remaining, a missing member, or an out-of-range index
/// all resolve to `None`.
pub fn resolve_path(path: &str, store: &VariableStore, node_id: Option<&str>) -> Option<VarValue> {
    let mut segments = path.split('.');
    let name = segments.next()?;
    let mut current = store.resolve(name, node_id)?;
    for segment in segments {
        current = match current {
            VarValue::Object(ref map) => map.get(segment)?.clone(),
            VarValue::Array(ref items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?.clone()
            }
            _ => return None,
        };
    }
    Some(current)
}
