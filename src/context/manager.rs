//! Ownership of the three context scopes.

use std::sync::Arc;

use dashmap::DashMap;

use crate::context::store::ContextStore;

/// Owns the Global scope and every Flow scope for the lifetime of the engine.
///
/// Built once at assembly time and shared by `Arc`. Flow scopes outlive
/// configuration reloads: a flow keeps its bookkeeping as long as its name
/// stays the same.
#[derive(Debug, Default)]
pub struct ContextManager {
    global: Arc<ContextStore>,
    flows: DashMap<String, Arc<ContextStore>>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> Arc<ContextStore> {
        self.global.clone()
    }

    /// Scope for `flow_name`, created on first use.
    pub fn flow(&self, flow_name: &str) -> Arc<ContextStore> {
        if let Some(existing) = self.flows.get(flow_name) {
            return existing.clone();
        }
        self.flows
            .entry(flow_name.to_string())
            .or_insert_with(|| Arc::new(ContextStore::new()))
            .clone()
    }

    /// Build the scopes visible to processors of `flow_name` during a walk.
    pub fn execution_context(
        &self,
        flow_name: &str,
        transactional: &TransactionalContext,
    ) -> ExecutionContext {
        ExecutionContext {
            global: self.global(),
            flow: self.flow(flow_name),
            transactional: transactional.store(),
        }
    }
}

/// Per-transaction scope.
///
/// Every walk starts from a fresh `new()` context. `reinitiate` clears a
/// context that is held across walks.
#[derive(Debug, Default, Clone)]
pub struct TransactionalContext {
    store: Arc<ContextStore>,
}

impl TransactionalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything left over from a previous walk.
    pub fn reinitiate(&self) {
        self.store.reset();
    }

    pub fn store(&self) -> Arc<ContextStore> {
        self.store.clone()
    }
}

/// The scopes a processor sees while it executes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub global: Arc<ContextStore>,
    pub flow: Arc<ContextStore>,
    pub transactional: Arc<ContextStore>,
}

impl ExecutionContext {
    /// Same global and transactional scopes, different flow scope.
    pub fn for_flow(&self, flow: Arc<ContextStore>) -> Self {
        Self {
            global: self.global.clone(),
            flow,
            transactional: self.transactional.clone(),
        }
    }
}
