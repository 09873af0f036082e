use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::store::ScopeKind;
use crate::core::value::VarValue;

/// A change notification pushed to watchers on every committed write.
#[derive(Debug, Clone, Serialize)]
pub struct VariableChange {
    pub name: String,
    pub scope: ScopeKind,
    pub value: VarValue,
    pub timestamp: DateTime<Utc>,
}

pub type ChangeSender = mpsc::UnboundedSender<VariableChange>;
pub type ChangeReceiver = mpsc::UnboundedReceiver<VariableChange>;

struct Watcher {
    subscriber: String,
    tx: ChangeSender,
}

/// Subscription registry for live variable watching.
///
/// Push mode: `watch` hands back a channel that receives every subsequent
/// change of that variable. Poll mode needs nothing from this feed —
/// consumers may ignore it and call `list`/`get` on their own interval.
#[derive(Default)]
pub struct WatchFeed {
    watchers: RwLock<HashMap<String, Vec<Watcher>>>,
}

impl WatchFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of one variable name. A second `watch` by the
    /// same subscriber replaces its previous channel for that name.
    pub fn watch(&self, variable_name: &str, subscriber: &str) -> ChangeReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watchers = self.watchers.write();
        let list = watchers.entry(variable_name.to_string()).or_default();
        list.retain(|w| w.subscriber != subscriber);
        list.push(Watcher {
            subscriber: subscriber.to_string(),
            tx,
        });
        rx
    }

    pub fn unwatch(&self, variable_name: &str, subscriber: &str) {
        let mut watchers = self.watchers.write();
        if let Some(list) = watchers.get_mut(variable_name) {
            list.retain(|w| w.subscriber != subscriber);
            if list.is_empty() {
                watchers.remove(variable_name);
            }
        }
    }

    /// Fan a change out to all watchers of that name. Channels whose
    /// receiver has been dropped are pruned here.
    pub fn notify(&self, change: VariableChange) {
        let mut watchers = self.watchers.write();
        let Some(list) = watchers.get_mut(&change.name) else {
            return;
        };
        list.retain(|w| w.tx.send(change.clone()).is_ok());
        if list.is_empty() {
            watchers.remove(&change.name);
        }
    }

    /// Drop all subscriptions, e.g. at instance completion.
    pub fn clear(&self) {
        self.watchers.write().clear();
    }

    pub fn watched_names(&self) -> Vec<String> {
        self.watchers.read().keys().cloned().collect()
    }
}
