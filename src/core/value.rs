use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::StoreError;

// ================================
// VarValue – closed variable type union
// ================================

/// A typed variable value. The union is closed: everything entering the
/// store must be classified into one of these seven variants, and boundary
/// intake rejects anything else as `InvalidValueType`.
#[derive(Debug, Clone)]
pub enum VarValue {
    Null,
    String(String),
    /// May hold NaN, the soft-failure sentinel produced by lenient numeric
    /// coercion. NaN serializes as a `null` payload under the `number` tag.
    Number(f64),
    Boolean(bool),
    Object(HashMap<String, VarValue>),
    Array(Vec<VarValue>),
    Date(DateTime<Utc>),
}

/// Discriminant tag of a [`VarValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Date,
    Null,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
            ValueType::Date => "date",
            ValueType::Null => "null",
        }
    }
}

impl VarValue {
    /// The discriminant tag. Always matches the runtime variant.
    pub fn value_type(&self) -> ValueType {
        match self {
            VarValue::Null => ValueType::Null,
            VarValue::String(_) => ValueType::String,
            VarValue::Number(_) => ValueType::Number,
            VarValue::Boolean(_) => ValueType::Boolean,
            VarValue::Object(_) => ValueType::Object,
            VarValue::Array(_) => ValueType::Array,
            VarValue::Date(_) => ValueType::Date,
        }
    }

    /// Classify an untyped JSON value. Plain JSON never carries a date tag,
    /// so this never produces `Date`; tagged intake does (see
    /// [`VarValue::from_typed_json`]).
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => VarValue::Null,
            Value::Bool(b) => VarValue::Boolean(*b),
            Value::Number(n) => VarValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => VarValue::String(s.clone()),
            Value::Array(arr) => VarValue::Array(arr.iter().map(VarValue::from_json).collect()),
            Value::Object(map) => VarValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), VarValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Rebuild a value from a type tag plus untyped payload, as found in
    /// export documents and external tagged intake. Fails with
    /// `InvalidValueType` when the payload does not match the tag.
    pub fn from_typed_json(value_type: ValueType, payload: &Value) -> Result<Self, StoreError> {
        let mismatch = |payload: &Value| {
            StoreError::InvalidValueType(format!(
                "payload {} does not match declared type '{}'",
                payload,
                value_type.as_str()
            ))
        };
        match value_type {
            ValueType::Null => match payload {
                Value::Null => Ok(VarValue::Null),
                other => Err(mismatch(other)),
            },
            ValueType::String => match payload {
                Value::String(s) => Ok(VarValue::String(s.clone())),
                other => Err(mismatch(other)),
            },
            ValueType::Number => match payload {
                Value::Number(n) => Ok(VarValue::Number(n.as_f64().unwrap_or(f64::NAN))),
                // NaN round-trips as a null payload under the number tag.
                Value::Null => Ok(VarValue::Number(f64::NAN)),
                other => Err(mismatch(other)),
            },
            ValueType::Boolean => match payload {
                Value::Bool(b) => Ok(VarValue::Boolean(*b)),
                other => Err(mismatch(other)),
            },
            ValueType::Object => match payload {
                Value::Object(_) => Ok(VarValue::from_json(payload)),
                other => Err(mismatch(other)),
            },
            ValueType::Array => match payload {
                Value::Array(_) => Ok(VarValue::from_json(payload)),
                other => Err(mismatch(other)),
            },
            ValueType::Date => match payload {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|dt| VarValue::Date(dt.with_timezone(&Utc)))
                    .map_err(|e| {
                        StoreError::InvalidValueType(format!("unparseable date '{}': {}", s, e))
                    }),
                other => Err(mismatch(other)),
            },
        }
    }

    /// Convert to untyped JSON. Dates render as RFC 3339 strings and NaN as
    /// `null`; pair with the type tag for a lossless round-trip.
    pub fn to_json(&self) -> Value {
        match self {
            VarValue::Null => Value::Null,
            VarValue::String(s) => Value::String(s.clone()),
            VarValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            VarValue::Boolean(b) => Value::Bool(*b),
            VarValue::Object(map) => {
                let m: serde_json::Map<String, Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                Value::Object(m)
            }
            VarValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            VarValue::Date(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Canonical textual rendering used for mixed-text interpolation,
    /// display, and free-text search. Null renders empty.
    pub fn display_string(&self) -> String {
        match self {
            VarValue::Null => String::new(),
            VarValue::String(s) => s.clone(),
            VarValue::Number(n) => n.to_string(),
            VarValue::Boolean(b) => b.to_string(),
            VarValue::Date(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            other => serde_json::to_string(&other.to_json()).unwrap_or_default(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, VarValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VarValue::Number(n) => Some(*n),
            VarValue::String(s) => s.trim().parse::<f64>().ok(),
            VarValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Rough in-memory footprint, used for quota accounting.
    pub fn estimate_bytes(&self) -> usize {
        match self {
            VarValue::Null => 0,
            VarValue::String(s) => s.len(),
            VarValue::Number(_) | VarValue::Boolean(_) | VarValue::Date(_) => 8,
            VarValue::Array(items) => items.iter().map(|v| v.estimate_bytes()).sum(),
            VarValue::Object(map) => map
                .iter()
                .map(|(k, v)| k.len() + v.estimate_bytes())
                .sum(),
        }
    }
}

impl PartialEq for VarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VarValue::Null, VarValue::Null) => true,
            (VarValue::String(a), VarValue::String(b)) => a == b,
            (VarValue::Number(a), VarValue::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-10
            }
            (VarValue::Boolean(a), VarValue::Boolean(b)) => a == b,
            (VarValue::Date(a), VarValue::Date(b)) => a == b,
            (VarValue::Array(a), VarValue::Array(b)) => a == b,
            (VarValue::Object(a), VarValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

impl Serialize for VarValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VarValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        Ok(VarValue::from_json(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_matches_variant() {
        assert_eq!(VarValue::Null.value_type(), ValueType::Null);
        assert_eq!(VarValue::String("a".into()).value_type(), ValueType::String);
        assert_eq!(VarValue::Number(1.0).value_type(), ValueType::Number);
        assert_eq!(VarValue::Boolean(true).value_type(), ValueType::Boolean);
        assert_eq!(VarValue::Array(vec![]).value_type(), ValueType::Array);
        assert_eq!(
            VarValue::Object(HashMap::new()).value_type(),
            ValueType::Object
        );
        assert_eq!(VarValue::Date(Utc::now()).value_type(), ValueType::Date);
    }

    #[test]
    fn test_from_json_classification() {
        assert!(matches!(VarValue::from_json(&json!(null)), VarValue::Null));
        assert!(matches!(
            VarValue::from_json(&json!(42)),
            VarValue::Number(n) if n == 42.0
        ));
        assert!(matches!(
            VarValue::from_json(&json!("hi")),
            VarValue::String(s) if s == "hi"
        ));
        assert!(matches!(
            VarValue::from_json(&json!([1, "a"])),
            VarValue::Array(v) if v.len() == 2
        ));
        assert!(matches!(
            VarValue::from_json(&json!({"k": true})),
            VarValue::Object(_)
        ));
    }

    #[test]
    fn test_typed_json_mismatch_rejected() {
        let err = VarValue::from_typed_json(ValueType::Number, &json!("not a number"));
        assert!(matches!(err, Err(StoreError::InvalidValueType(_))));

        let err = VarValue::from_typed_json(ValueType::Date, &json!("yesterday"));
        assert!(matches!(err, Err(StoreError::InvalidValueType(_))));
    }

    #[test]
    fn test_typed_json_date_roundtrip() {
        let dt = Utc::now();
        let value = VarValue::Date(dt);
        let payload = value.to_json();
        let back = VarValue::from_typed_json(ValueType::Date, &payload).unwrap();
        match back {
            VarValue::Date(parsed) => {
                assert_eq!(parsed.timestamp_millis(), dt.timestamp_millis())
            }
            other => panic!("expected Date, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_roundtrip_under_number_tag() {
        let nan = VarValue::Number(f64::NAN);
        assert_eq!(nan.to_json(), Value::Null);
        let back = VarValue::from_typed_json(ValueType::Number, &Value::Null).unwrap();
        assert!(matches!(back, VarValue::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(VarValue::Number(42.0).display_string(), "42");
        assert_eq!(VarValue::Number(3.5).display_string(), "3.5");
        assert_eq!(VarValue::Boolean(true).display_string(), "true");
        assert_eq!(VarValue::Null.display_string(), "");
        assert_eq!(
            VarValue::from_json(&json!({"a": 1})).display_string(),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_nan_equals_nan() {
        assert_eq!(VarValue::Number(f64::NAN), VarValue::Number(f64::NAN));
        assert_ne!(VarValue::Number(f64::NAN), VarValue::Number(1.0));
    }

    #[test]
    fn test_as_f64_lenient() {
        assert_eq!(VarValue::String(" 10 ".into()).as_f64(), Some(10.0));
        assert_eq!(VarValue::Boolean(false).as_f64(), Some(0.0));
        assert_eq!(VarValue::Array(vec![]).as_f64(), None);
    }
}
