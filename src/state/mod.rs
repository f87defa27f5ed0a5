// Ephemeral state module
//
// Process-wide, in-memory key/value store for transient flags that must not be
// persisted. Every `set` broadcasts the full before/after snapshot, even when
// the written value equals the stored one.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Ephemeral flag that opens the companion-server authorization window.
/// Auto-cleared by the orchestrator after [`AUTH_WINDOW_TTL`].
pub const COMPANION_AUTH_WINDOW_KEY: &str = "companionServerAuthWindowEnabled";

/// Lifetime of the companion-server authorization window.
pub const AUTH_WINDOW_TTL: std::time::Duration = std::time::Duration::from_secs(300);

/// Ephemeral snapshot. Insertion order is preserved.
pub type EphemeralSnapshot = IndexMap<String, Value>;

/// Full before/after pair emitted on every `set`.
#[derive(Debug, Clone)]
pub struct EphemeralChange {
    pub new: Arc<EphemeralSnapshot>,
    pub old: Arc<EphemeralSnapshot>,
}

impl EphemeralChange {
    /// Keys whose value differs between `old` and `new` (including added and
    /// removed keys).
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .new
            .iter()
            .filter(|(key, value)| self.old.get(*key) != Some(*value))
            .map(|(key, _)| key.as_str())
            .collect();
        keys.extend(
            self.old
                .keys()
                .filter(|key| !self.new.contains_key(*key))
                .map(String::as_str),
        );
        keys
    }
}

/// Reads a boolean flag; absent or non-boolean values count as `false`.
pub fn flag(snapshot: &EphemeralSnapshot, key: &str) -> bool {
    snapshot.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Thread-safe ephemeral store with at-least-once change broadcasting.
///
/// Unlike [`ConfigStore`](crate::config::ConfigStore), which only emits on an
/// effective change, `set` always emits. Subscribers that count notifications
/// observe one per write.
pub struct EphemeralStore {
    state: Arc<RwLock<Arc<EphemeralSnapshot>>>,

    /// Broadcast channel for emitting change pairs
    change_tx: broadcast::Sender<EphemeralChange>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(Arc::new(EphemeralSnapshot::new()))),
            change_tx,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.get(key).cloned()
    }

    pub fn get_flag(&self, key: &str) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        flag(&state, key)
    }

    pub fn snapshot(&self) -> Arc<EphemeralSnapshot> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*state)
    }

    /// Write `value` under `key` and broadcast, unconditionally.
    pub fn set(&self, key: &str, value: Value) -> EphemeralChange {
        self.mutate(|snapshot| {
            snapshot.insert(key.to_string(), value);
        })
    }

    /// Remove `key` and broadcast.
    pub fn remove(&self, key: &str) -> EphemeralChange {
        self.mutate(|snapshot| {
            snapshot.shift_remove(key);
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EphemeralChange> {
        self.change_tx.subscribe()
    }

    fn mutate<F>(&self, mutate_fn: F) -> EphemeralChange
    where
        F: FnOnce(&mut EphemeralSnapshot),
    {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = (**state).clone();
        mutate_fn(&mut updated);

        let new = Arc::new(updated);
        let old = std::mem::replace(&mut *state, Arc::clone(&new));
        let change = EphemeralChange { new, old };

        tracing::debug!("Ephemeral state written: {:?}", change.changed_keys());

        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change.clone());
        change
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EphemeralStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            change_tx: self.change_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_key() {
        let store = EphemeralStore::new();
        assert!(store.get("missing").is_none());
        assert!(!store.get_flag("missing"));
    }

    #[test]
    fn test_set_and_get() {
        let store = EphemeralStore::new();
        store.set(COMPANION_AUTH_WINDOW_KEY, json!(true));

        assert_eq!(store.get(COMPANION_AUTH_WINDOW_KEY), Some(json!(true)));
        assert!(store.get_flag(COMPANION_AUTH_WINDOW_KEY));
    }

    #[test]
    fn test_unchanged_set_still_broadcasts() {
        let store = EphemeralStore::new();
        let mut rx = store.subscribe();

        store.set("k", json!(1));
        store.set("k", json!(1));

        assert!(rx.try_recv().is_ok());
        let second = rx.try_recv().unwrap();
        assert_eq!(second.old.get("k"), Some(&json!(1)));
        assert_eq!(second.new.get("k"), Some(&json!(1)));
        assert!(second.changed_keys().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = EphemeralStore::new();
        store.set("k", json!("a"));
        store.set("k", json!("b"));
        assert_eq!(store.get("k"), Some(json!("b")));
    }

    #[test]
    fn test_changed_keys_include_removals() {
        let store = EphemeralStore::new();
        store.set("a", json!(1));
        store.set("b", json!(2));

        let change = store.remove("a");

        assert_eq!(change.changed_keys(), vec!["a"]);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_non_boolean_flag_is_false() {
        let store = EphemeralStore::new();
        store.set("k", json!("yes"));
        assert!(!store.get_flag("k"));
    }

    #[test]
    fn test_clone_shares_state() {
        let store1 = EphemeralStore::new();
        let store2 = store1.clone();

        store1.set("k", json!(true));

        assert!(store2.get_flag("k"));
    }
}
