pub mod cancel;
pub mod context;
pub mod export;
pub mod history;
pub mod store;
pub mod value;
pub mod watch;

pub use cancel::CancelSignal;
pub use context::{InstanceContext, TimeProvider};
pub use export::VariableExport;
pub use history::{HistoryEntry, HistoryLedger};
pub use store::{
    Scope, ScopeKind, SharedGlobals, StoreLimits, Variable, VariableFilter, VariableStore,
};
pub use value::{ValueType, VarValue};
pub use watch::{ChangeReceiver, VariableChange, WatchFeed};
