use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::core::value::{ValueType, VarValue};

/// One recorded write. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub variable_name: String,
    pub value_type: ValueType,
    pub value: VarValue,
    pub timestamp: DateTime<Utc>,
    /// Optional note supplied by the writer, e.g. the scheduler recording
    /// which execution event produced this write.
    pub description: Option<String>,
}

/// Append-only change ledger, one list per variable name, independent of
/// the current-value table. Entries are appended in commit order and never
/// mutated or deleted.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: DashMap<String, Vec<HistoryEntry>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: HistoryEntry) {
        self.entries
            .entry(entry.variable_name.clone())
            .or_default()
            .push(entry);
    }

    /// All entries for a variable, oldest first. A variable that never
    /// existed yields an empty list, not an error.
    pub fn get(&self, variable_name: &str) -> Vec<HistoryEntry> {
        self.entries
            .get(variable_name)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, variable_name: &str) -> usize {
        self.entries.get(variable_name).map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, value: VarValue, millis: i64) -> HistoryEntry {
        HistoryEntry {
            variable_name: name.to_string(),
            value_type: value.value_type(),
            value,
            timestamp: DateTime::<Utc>::from_timestamp_millis(millis).unwrap(),
            description: None,
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let ledger = HistoryLedger::new();
        ledger.append(entry("x", VarValue::Number(1.0), 100));
        ledger.append(entry("x", VarValue::Number(2.0), 200));
        ledger.append(entry("x", VarValue::Number(3.0), 300));

        let history = ledger.get("x");
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(history[2].value, VarValue::Number(3.0));
    }

    #[test]
    fn test_unknown_variable_is_empty_not_error() {
        let ledger = HistoryLedger::new();
        assert!(ledger.get("never-written").is_empty());
        assert_eq!(ledger.len("never-written"), 0);
    }

    #[test]
    fn test_names_are_independent() {
        let ledger = HistoryLedger::new();
        ledger.append(entry("a", VarValue::Boolean(true), 1));
        ledger.append(entry("b", VarValue::Boolean(false), 2));
        assert_eq!(ledger.len("a"), 1);
        assert_eq!(ledger.len("b"), 1);
    }
}
