//! Process-wide application state.
//!
//! [`SharedState`] is owned by the host and handed to the lifespan scope, where startup and
//! shutdown hooks mutate it. Every request scope receives a [`State`] snapshot taken at
//! connection time; changes a request makes to its snapshot never flow back.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

type Value = Arc<dyn Any + Send + Sync>;

/// A string keyed, type-erased value map.
///
/// Cloning is shallow: values sit behind [`Arc`], so a snapshot shares the values themselves
/// while the key set of each copy evolves independently.
#[derive(Clone, Default)]
pub struct State {
    inner: HashMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning whether a previous value was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.inner.insert(key.into(), Arc::new(value)).is_some()
    }

    /// Returns the value under `key` if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.inner.keys().collect::<Vec<_>>();
        keys.sort();
        f.debug_struct("State").field("keys", &keys).finish()
    }
}

/// The host side handle of the process-wide [`State`].
#[derive(Clone, Default, Debug)]
pub struct SharedState {
    inner: Arc<Mutex<State>>,
}

impl SharedState {
    pub fn new(state: State) -> Self {
        Self { inner: Arc::new(Mutex::new(state)) }
    }

    /// Copies the current state, used to seed a request scope.
    pub async fn snapshot(&self) -> State {
        self.inner.lock().await.clone()
    }

    /// Locks the state for mutation, used by the lifespan hooks.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, State> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut state = State::new();
        assert!(!state.insert("counter", 1_u32));
        assert!(state.insert("counter", 2_u32));
        state.insert("name", String::from("micro"));

        assert_eq!(state.get::<u32>("counter"), Some(&2));
        assert_eq!(state.get::<String>("name").map(String::as_str), Some("micro"));
        assert!(state.get::<u64>("counter").is_none());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_snapshot_does_not_propagate() {
        let mut origin = State::new();
        origin.insert("db", String::from("pool"));

        let mut copy = origin.clone();
        copy.insert("user", 7_i32);
        copy.remove("db");

        assert!(origin.contains_key("db"));
        assert!(!origin.contains_key("user"));
        assert!(!copy.contains_key("db"));
    }

    #[tokio::test]
    async fn test_shared_state_snapshot() {
        let shared = SharedState::default();
        shared.lock().await.insert("ready", true);

        let mut snapshot = shared.snapshot().await;
        snapshot.insert("ready", false);

        assert_eq!(shared.lock().await.get::<bool>("ready"), Some(&true));
        assert_eq!(snapshot.get::<bool>("ready"), Some(&false));
    }
}
