use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::context::InstanceContext;
use crate::core::history::{HistoryEntry, HistoryLedger};
use crate::core::value::{ValueType, VarValue};
use crate::core::watch::{ChangeReceiver, VariableChange, WatchFeed};
use crate::error::{StoreError, StoreResult};

// ================================
// Scopes
// ================================

/// The namespace a variable lives in. Node-scoped variables are private to
/// one node and carry the owning node id in the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Workflow,
    Node(String),
    Global,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Workflow => ScopeKind::Workflow,
            Scope::Node(_) => ScopeKind::Node,
            Scope::Global => ScopeKind::Global,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Scope::Node(id) => Some(id),
            _ => None,
        }
    }
}

/// Scope discriminant without the node id, used in filters and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Workflow,
    Node,
    Global,
}

impl ScopeKind {
    fn rank(&self) -> u8 {
        match self {
            ScopeKind::Workflow => 0,
            ScopeKind::Node => 1,
            ScopeKind::Global => 2,
        }
    }
}

// ================================
// Records
// ================================

#[derive(Debug, Clone)]
struct StoredVar {
    value: VarValue,
    updated_at: DateTime<Utc>,
}

/// A variable row as exposed to listing, export, and monitoring consumers.
/// Serializes with an explicit `type` tag so that snapshots round-trip
/// losslessly (dates and NaN included).
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub scope: ScopeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub value: VarValue,
    pub instance_id: String,
    pub updated_at: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for Variable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            scope: ScopeKind,
            #[serde(default)]
            node_id: Option<String>,
            #[serde(rename = "type")]
            value_type: ValueType,
            value: Value,
            instance_id: String,
            updated_at: DateTime<Utc>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let value = VarValue::from_typed_json(raw.value_type, &raw.value)
            .map_err(serde::de::Error::custom)?;
        Ok(Variable {
            name: raw.name,
            scope: raw.scope,
            node_id: raw.node_id,
            value_type: raw.value_type,
            value,
            instance_id: raw.instance_id,
            updated_at: raw.updated_at,
        })
    }
}

/// Listing filter. All criteria are optional and conjunctive; `search`
/// matches case-insensitively against the name and the rendered value.
#[derive(Debug, Clone, Default)]
pub struct VariableFilter {
    pub scope: Option<ScopeKind>,
    pub value_type: Option<ValueType>,
    pub search: Option<String>,
}

/// Optional quotas enforced before a write changes any state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLimits {
    pub max_variables: Option<usize>,
    pub max_total_bytes: Option<usize>,
}

/// Global-scope segment, shareable across stores created from the same
/// workflow definition.
#[derive(Clone, Default)]
pub struct SharedGlobals(Arc<DashMap<String, StoredVar>>);

impl SharedGlobals {
    pub fn new() -> Self {
        Self::default()
    }
}

// ================================
// VariableStore
// ================================

/// All variables for one workflow instance, keyed by `(scope, name)` with
/// node-scoped entries additionally keyed by node id.
///
/// Concurrency: the map is shard-locked, so writes to different keys do not
/// block each other. Each `set` holds its entry lock across the value write,
/// the history append, and the watch notification, making the commit atomic
/// per key. Two concurrent writes to the same key race last-writer-wins;
/// callers needing coordination must serialize at the scheduler level.
pub struct VariableStore {
    ctx: InstanceContext,
    locals: DashMap<(Scope, String), StoredVar>,
    globals: SharedGlobals,
    history: HistoryLedger,
    watch: WatchFeed,
    limits: StoreLimits,
}

impl VariableStore {
    pub fn new(ctx: InstanceContext) -> Self {
        Self {
            ctx,
            locals: DashMap::new(),
            globals: SharedGlobals::new(),
            history: HistoryLedger::new(),
            watch: WatchFeed::new(),
            limits: StoreLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Attach a global-scope segment shared with other instances of the
    /// same workflow definition.
    pub fn with_shared_globals(mut self, globals: SharedGlobals) -> Self {
        self.globals = globals;
        self
    }

    pub fn shared_globals(&self) -> SharedGlobals {
        self.globals.clone()
    }

    pub fn instance_id(&self) -> &str {
        &self.ctx.instance_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.ctx.workflow_id
    }

    pub fn context(&self) -> &InstanceContext {
        &self.ctx
    }

    // --- writes ---

    pub fn set(&self, scope: Scope, name: &str, value: VarValue) -> StoreResult<()> {
        self.set_described(scope, name, value, None)
    }

    /// Write a variable, recording `description` in its history entry.
    /// Overwrites the current value; never deletes history.
    pub fn set_described(
        &self,
        scope: Scope,
        name: &str,
        value: VarValue,
        description: Option<&str>,
    ) -> StoreResult<()> {
        self.check_limits(&scope, name, &value)?;
        let kind = scope.kind();

        // The entry guard stays held across the history append and the
        // watch notification: the commit is atomic per key. The clock is
        // read only once the guard is held, so same-key history entries
        // carry timestamps in commit order.
        match &scope {
            Scope::Global => {
                let entry = self.globals.0.entry(name.to_string());
                let now = self.ctx.now();
                let mut slot = entry.or_insert_with(|| StoredVar {
                    value: VarValue::Null,
                    updated_at: now,
                });
                slot.value = value.clone();
                slot.updated_at = now;
                self.commit(kind, name, value, now, description);
            }
            _ => {
                let entry = self.locals.entry((scope.clone(), name.to_string()));
                let now = self.ctx.now();
                let mut slot = entry.or_insert_with(|| StoredVar {
                    value: VarValue::Null,
                    updated_at: now,
                });
                slot.value = value.clone();
                slot.updated_at = now;
                self.commit(kind, name, value, now, description);
            }
        }
        Ok(())
    }

    /// Classify and write an untyped JSON value.
    pub fn set_json(&self, scope: Scope, name: &str, value: &Value) -> StoreResult<()> {
        self.set(scope, name, VarValue::from_json(value))
    }

    /// Tagged intake for external callers that declare a type alongside the
    /// payload. Rejects tag/payload mismatches with `InvalidValueType`
    /// before any state changes.
    pub fn set_json_tagged(
        &self,
        scope: Scope,
        name: &str,
        value_type: ValueType,
        payload: &Value,
    ) -> StoreResult<()> {
        let value = VarValue::from_typed_json(value_type, payload)?;
        self.set(scope, name, value)
    }

    fn commit(
        &self,
        kind: ScopeKind,
        name: &str,
        value: VarValue,
        now: DateTime<Utc>,
        description: Option<&str>,
    ) {
        debug!(variable = name, scope = ?kind, "variable committed");
        self.history.append(HistoryEntry {
            variable_name: name.to_string(),
            value_type: value.value_type(),
            value: value.clone(),
            timestamp: now,
            description: description.map(|s| s.to_string()),
        });
        self.watch.notify(VariableChange {
            name: name.to_string(),
            scope: kind,
            value,
            timestamp: now,
        });
    }

    fn check_limits(&self, scope: &Scope, name: &str, value: &VarValue) -> StoreResult<()> {
        if let Some(max) = self.limits.max_variables {
            let is_new = self.get(scope, name).is_none();
            if is_new && self.len() >= max {
                return Err(StoreError::QuotaExceeded(format!(
                    "store holds {} variables (max {})",
                    self.len(),
                    max
                )));
            }
        }
        if let Some(max) = self.limits.max_total_bytes {
            let projected = self.estimate_total_bytes() + value.estimate_bytes();
            if projected > max {
                return Err(StoreError::QuotaExceeded(format!(
                    "projected size {} bytes exceeds {} bytes",
                    projected, max
                )));
            }
        }
        Ok(())
    }

    // --- reads ---

    /// Current value, or `None` on a miss. A miss is not an error; the
    /// caller decides whether it matters.
    pub fn get(&self, scope: &Scope, name: &str) -> Option<VarValue> {
        match scope {
            Scope::Global => self.globals.0.get(name).map(|v| v.value.clone()),
            _ => self
                .locals
                .get(&(scope.clone(), name.to_string()))
                .map(|v| v.value.clone()),
        }
    }

    /// Resolve a bare name the way interpolation does: the current node's
    /// private scope first (when there is one), then workflow, then global.
    pub fn resolve(&self, name: &str, node_id: Option<&str>) -> Option<VarValue> {
        if let Some(node_id) = node_id {
            if let Some(v) = self.get(&Scope::Node(node_id.to_string()), name) {
                return Some(v);
            }
        }
        self.get(&Scope::Workflow, name)
            .or_else(|| self.get(&Scope::Global, name))
    }

    /// Filtered snapshot of the current state. Finite and restartable; not
    /// a live view. Ordered by scope, then name, then node id.
    pub fn list(&self, filter: &VariableFilter) -> Vec<Variable> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let matches = |var: &Variable| {
            if let Some(scope) = filter.scope {
                if var.scope != scope {
                    return false;
                }
            }
            if let Some(value_type) = filter.value_type {
                if var.value_type != value_type {
                    return false;
                }
            }
            if let Some(needle) = &search {
                let in_name = var.name.to_lowercase().contains(needle);
                let in_value = var.value.display_string().to_lowercase().contains(needle);
                if !in_name && !in_value {
                    return false;
                }
            }
            true
        };

        let mut out: Vec<Variable> = self
            .locals
            .iter()
            .map(|entry| {
                let (scope, name) = entry.key();
                self.make_record(name, scope.kind(), scope.node_id(), entry.value())
            })
            .chain(self.globals.0.iter().map(|entry| {
                self.make_record(entry.key(), ScopeKind::Global, None, entry.value())
            }))
            .filter(matches)
            .collect();
        out.sort_by(|a, b| {
            (a.scope.rank(), &a.name, &a.node_id).cmp(&(b.scope.rank(), &b.name, &b.node_id))
        });
        out
    }

    fn make_record(
        &self,
        name: &str,
        scope: ScopeKind,
        node_id: Option<&str>,
        stored: &StoredVar,
    ) -> Variable {
        Variable {
            name: name.to_string(),
            scope,
            node_id: node_id.map(|s| s.to_string()),
            value_type: stored.value.value_type(),
            value: stored.value.clone(),
            instance_id: self.ctx.instance_id.clone(),
            updated_at: stored.updated_at,
        }
    }

    /// Change history of one variable name, oldest first. Empty if the
    /// variable was never written.
    pub fn history(&self, name: &str) -> Vec<HistoryEntry> {
        self.history.get(name)
    }

    pub fn len(&self) -> usize {
        self.locals.len() + self.globals.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn estimate_total_bytes(&self) -> usize {
        let locals: usize = self
            .locals
            .iter()
            .map(|e| e.key().1.len() + e.value().value.estimate_bytes())
            .sum();
        let globals: usize = self
            .globals
            .0
            .iter()
            .map(|e| e.key().len() + e.value().value.estimate_bytes())
            .sum();
        locals + globals
    }

    /// Drop a node's private variables when the scheduler retires it.
    /// History is kept.
    pub fn remove_node(&self, node_id: &str) {
        self.locals
            .retain(|(scope, _), _| scope.node_id() != Some(node_id));
    }

    // --- watch feed ---

    pub fn watch(&self, variable_name: &str, subscriber: &str) -> ChangeReceiver {
        self.watch.watch(variable_name, subscriber)
    }

    pub fn unwatch(&self, variable_name: &str, subscriber: &str) {
        self.watch.unwatch(variable_name, subscriber)
    }

    /// Drop all watch subscriptions, e.g. at instance completion.
    pub fn clear_watches(&self) {
        self.watch.clear()
    }

    pub fn watched_names(&self) -> Vec<String> {
        self.watch.watched_names()
    }
}
