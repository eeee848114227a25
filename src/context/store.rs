//! A single context scope.

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by context scope lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The key was never set, or was already popped.
    #[error("key {0} not found in context")]
    NotFound(String),
}

/// Concurrent key/value map backing one context scope.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: DashMap<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Return a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Value, ContextError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContextError::NotFound(key.to_string()))
    }

    /// Remove `key` and return the value it held.
    pub fn pop(&self, key: &str) -> Result<Value, ContextError> {
        self.entries
            .remove(key)
            .map(|(_, value)| value)
            .ok_or_else(|| ContextError::NotFound(key.to_string()))
    }

    /// Drop every entry in this scope.
    pub fn reset(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
