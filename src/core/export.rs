use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::store::{Scope, ScopeKind, Variable, VariableFilter, VariableStore};
use crate::error::StoreResult;

/// Portable snapshot of an instance's full variable set, used for download
/// and debug snapshots. Type tags are preserved, so the document
/// round-trips losslessly through [`VariableStore::import_snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableExport {
    pub instance_id: String,
    pub workflow_id: String,
    pub exported_at: DateTime<Utc>,
    pub variables: Vec<Variable>,
}

impl VariableStore {
    pub fn export_snapshot(&self) -> VariableExport {
        VariableExport {
            instance_id: self.instance_id().to_string(),
            workflow_id: self.workflow_id().to_string(),
            exported_at: self.context().now(),
            variables: self.list(&VariableFilter::default()),
        }
    }

    /// Write every variable of a snapshot into this store. Imports go
    /// through the normal write path, so they append history and notify
    /// watchers like any other write.
    pub fn import_snapshot(&self, doc: &VariableExport) -> StoreResult<usize> {
        let mut imported = 0;
        for var in &doc.variables {
            let scope = match (&var.scope, &var.node_id) {
                (ScopeKind::Node, Some(node_id)) => Scope::Node(node_id.clone()),
                (ScopeKind::Node, None) => continue,
                (ScopeKind::Workflow, _) => Scope::Workflow,
                (ScopeKind::Global, _) => Scope::Global,
            };
            self.set_described(scope, &var.name, var.value.clone(), Some("imported snapshot"))?;
            imported += 1;
        }
        Ok(imported)
    }
}
