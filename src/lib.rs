//! # Flowvar — Workflow Variable Engine
//!
//! `flowvar` is the variable subsystem of a workflow runtime: every node
//! execution reads its inputs from and writes its outputs through one
//! [`VariableStore`] per workflow instance.
//!
//! - **Typed values**: a closed union of string, number, boolean, object,
//!   array, date, and null, with lossless type-tagged serialization.
//! - **Scoped store**: variables live in `workflow`, `node`, or `global`
//!   scope; writes are atomic per key and safe across parallel branches.
//! - **Change history**: an append-only ledger of every write, queryable
//!   per variable for audit and debugging.
//! - **Interpolation**: `${name}` and dotted-path `${a.b.0.c}` tokens
//!   resolved against the store, type-preserving for whole-token strings.
//! - **Transformations**: a fixed registry of pure functions
//!   (`toUpperCase`, `toNumber`, ...) chained inside mapping expressions.
//! - **Mapping pipeline**: declarative input/output mappings applied
//!   around node execution, with aggregated non-fatal diagnostics.
//! - **Watch feed**: push subscriptions for live variable panels, with
//!   polling via `list`/`get` always available.
//!
//! # Quick Start
//!
//! ```rust
//! use flowvar::{
//!     InstanceContext, MappingPipeline, OutputMapping, Scope, TransformRegistry, VarValue,
//!     VariableStore,
//! };
//! use serde_json::json;
//!
//! let store = VariableStore::new(InstanceContext::new("order-flow"));
//! store.set(Scope::Workflow, "amount", VarValue::Number(1500.0)).unwrap();
//!
//! let registry = TransformRegistry::builtin();
//! let pipeline = MappingPipeline::new(&store, &registry);
//! let mapping: OutputMapping = serde_json::from_value(json!({
//!     "id": "m1",
//!     "source_field": "output.approved",
//!     "target_variable": "isApproved"
//! })).unwrap();
//! let diagnostics = pipeline.apply_output_mappings(
//!     "decision",
//!     &json!({"output": {"approved": true}}),
//!     &[mapping],
//! );
//! assert!(diagnostics.is_empty());
//! assert_eq!(store.get(&Scope::Workflow, "isApproved"), Some(VarValue::Boolean(true)));
//! ```

pub mod core;
pub mod error;
pub mod mapping;
pub mod template;
pub mod transform;

pub use crate::core::{
    CancelSignal, HistoryEntry, InstanceContext, Scope, ScopeKind, SharedGlobals, StoreLimits,
    TimeProvider, ValueType, VarValue, Variable, VariableChange, VariableExport, VariableFilter,
    VariableStore,
};
pub use crate::error::{Diagnostic, DiagnosticKind, StoreError, StoreResult};
pub use crate::mapping::{InputMapping, MappingPipeline, OutputMapping};
pub use crate::template::interpolate;
pub use crate::transform::TransformRegistry;
