use std::collections::HashMap;

use crate::core::value::VarValue;

/// Result of one transformation step. `soft_failure` carries the detail of
/// a lenient coercion that produced a sentinel instead of failing hard,
/// e.g. `toNumber("abc")` → NaN.
pub struct TransformOutcome {
    pub value: VarValue,
    pub soft_failure: Option<String>,
}

impl TransformOutcome {
    fn ok(value: VarValue) -> Self {
        Self {
            value,
            soft_failure: None,
        }
    }

    fn soft(value: VarValue, detail: impl Into<String>) -> Self {
        Self {
            value,
            soft_failure: Some(detail.into()),
        }
    }
}

pub(crate) type TransformFn = fn(&VarValue) -> TransformOutcome;

/// Fixed name → pure function table.
pub struct TransformRegistry {
    table: HashMap<&'static str, TransformFn>,
}

impl TransformRegistry {
    /// The built-in function set.
    pub fn builtin() -> Self {
        let mut table: HashMap<&'static str, TransformFn> = HashMap::new();
        table.insert("toUpperCase", to_upper_case);
        table.insert("toLowerCase", to_lower_case);
        table.insert("trim", trim);
        table.insert("toNumber", to_number);
        table.insert("toString", to_string);
        table.insert("toBoolean", to_boolean);
        table.insert("toJson", to_json);
        table.insert("parseJson", parse_json);
        table.insert("length", length);
        Self { table }
    }

    /// Test-only entry point for instrumented functions. The production
    /// table is fixed to the built-in set.
    #[cfg(test)]
    pub(crate) fn register(&mut self, name: &'static str, f: TransformFn) {
        self.table.insert(name, f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn apply(&self, name: &str, value: &VarValue) -> Option<TransformOutcome> {
        self.table.get(name).map(|f| f(value))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// --- built-in functions ---

fn to_upper_case(value: &VarValue) -> TransformOutcome {
    TransformOutcome::ok(VarValue::String(value.display_string().to_uppercase()))
}

fn to_lower_case(value: &VarValue) -> TransformOutcome {
    TransformOutcome::ok(VarValue::String(value.display_string().to_lowercase()))
}

fn trim(value: &VarValue) -> TransformOutcome {
    TransformOutcome::ok(VarValue::String(value.display_string().trim().to_string()))
}

fn to_string(value: &VarValue) -> TransformOutcome {
    TransformOutcome::ok(VarValue::String(value.display_string()))
}

/// Lenient numeric coercion. Non-numeric input yields the NaN sentinel as a
/// soft failure; the caller records a diagnostic but still uses the value.
fn to_number(value: &VarValue) -> TransformOutcome {
    match value {
        VarValue::Number(n) => TransformOutcome::ok(VarValue::Number(*n)),
        VarValue::Boolean(b) => TransformOutcome::ok(VarValue::Number(if *b { 1.0 } else { 0.0 })),
        VarValue::Null => TransformOutcome::ok(VarValue::Number(0.0)),
        VarValue::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => TransformOutcome::ok(VarValue::Number(n)),
            Err(_) => TransformOutcome::soft(
                VarValue::Number(f64::NAN),
                format!("cannot convert '{}' to number", s),
            ),
        },
        other => TransformOutcome::soft(
            VarValue::Number(f64::NAN),
            format!("cannot convert {} to number", other.value_type().as_str()),
        ),
    }
}

fn to_boolean(value: &VarValue) -> TransformOutcome {
    let b = match value {
        VarValue::Boolean(b) => *b,
        VarValue::Null => false,
        VarValue::Number(n) => *n != 0.0 && !n.is_nan(),
        VarValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            _ => true,
        },
        VarValue::Object(_) | VarValue::Array(_) | VarValue::Date(_) => true,
    };
    TransformOutcome::ok(VarValue::Boolean(b))
}

fn to_json(value: &VarValue) -> TransformOutcome {
    let rendered = serde_json::to_string(&value.to_json()).unwrap_or_default();
    TransformOutcome::ok(VarValue::String(rendered))
}

fn parse_json(value: &VarValue) -> TransformOutcome {
    match value {
        VarValue::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(parsed) => TransformOutcome::ok(VarValue::from_json(&parsed)),
            Err(e) => TransformOutcome::soft(VarValue::Null, format!("invalid JSON: {}", e)),
        },
        _ => TransformOutcome::soft(
            VarValue::Null,
            format!("parseJson expects a string, got {}", value.value_type().as_str()),
        ),
    }
}

fn length(value: &VarValue) -> TransformOutcome {
    match value {
        VarValue::String(s) => TransformOutcome::ok(VarValue::Number(s.chars().count() as f64)),
        VarValue::Array(items) => TransformOutcome::ok(VarValue::Number(items.len() as f64)),
        VarValue::Object(map) => TransformOutcome::ok(VarValue::Number(map.len() as f64)),
        other => TransformOutcome::soft(
            VarValue::Number(f64::NAN),
            format!("length of {} is undefined", other.value_type().as_str()),
        ),
    }
}
