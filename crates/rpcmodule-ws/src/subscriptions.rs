//! WebSocket subscription bookkeeping.
//!
//! Tracks the `eth_subscribe` subscriptions opened through a transport so
//! they can be torn down with `eth_unsubscribe` before the transport is
//! replaced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SubscriptionEntry {
    /// The subscription type (e.g. `"newHeads"`, `"logs"`).
    kind: String,
    sender: mpsc::UnboundedSender<Value>,
}

/// Active subscriptions of one connection, shared with its background task.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<SubscriptionId, SubscriptionEntry>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a panicking reader; the map is still valid.
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, SubscriptionEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new subscription and return the stream of its notifications.
    pub fn register(&self, id: SubscriptionId, kind: String) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, SubscriptionEntry { kind, sender: tx });
        rx
    }

    /// Forward an incoming notification to the correct subscription.
    pub fn dispatch(&self, id: &SubscriptionId, message: Value) {
        if let Some(entry) = self.lock().get(id) {
            let _ = entry.sender.send(message);
        }
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Drop every subscription, closing their notification streams.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// IDs of all active subscriptions.
    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.lock().keys().cloned().collect()
    }

    /// The kind a subscription was opened with.
    pub fn kind(&self, id: &SubscriptionId) -> Option<String> {
        self.lock().get(id).map(|e| e.kind.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("active", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_dispatch() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0xdeadbeef".into());
        let mut rx = mgr.register(id.clone(), "newHeads".into());

        mgr.dispatch(&id, serde_json::json!({"number": "0x1"}));

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg["number"], "0x1");
        assert_eq!(mgr.kind(&id).as_deref(), Some("newHeads"));
    }

    #[test]
    fn remove_subscription() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x1".into());
        let _rx = mgr.register(id.clone(), "logs".into());
        assert_eq!(mgr.len(), 1);
        assert!(mgr.remove(&id));
        assert!(!mgr.remove(&id));
        assert!(mgr.is_empty());
    }

    #[test]
    fn clear_closes_streams() {
        let mgr = SubscriptionManager::new();
        let mut rx = mgr.register(SubscriptionId("0xa".into()), "newHeads".into());
        mgr.register(SubscriptionId("0xb".into()), "logs".into());
        assert_eq!(mgr.ids().len(), 2);

        mgr.clear();
        assert!(mgr.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
