//! Listener registry keyed by exact `(event_type, scope)` pairs

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{ElementScope, Listener};

type Key = (String, ElementScope);

/// Append-only store of listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<Key, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` under the key. Duplicates are kept.
    pub fn register(&self, event_type: &str, scope: ElementScope, listener: Listener) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners
            .entry((event_type.to_string(), scope))
            .or_default()
            .push(listener);
    }

    /// Copy of the listeners registered under exactly this key, in registration order
    pub fn snapshot(&self, event_type: &str, scope: &ElementScope) -> Vec<Listener> {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners
            .get(&(event_type.to_string(), scope.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of listeners across all keys
    pub fn len(&self) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
