//! Flow lookup for a stream.
//!
//! # Responsibilities
//! - Store compiled filters per flow type
//! - Return every matching flow, most specific first
//! - Report explicitly whether anything matched

use std::collections::HashSet;

use thiserror::Error;

use crate::flow::{FlowRepresentation, FlowType};
use crate::runtime::stream::ApiStream;
use crate::selector::filter::Filter;
use crate::selector::matcher::{AndMatcher, Matcher};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("flow {0} is already registered in the selector")]
    DuplicateFlow(String),

    #[error("flow {0} has an empty URL filter")]
    EmptyFilter(String),
}

/// Flows matching one stream, grouped by type and ordered for execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorResult {
    pub user: Vec<String>,
    pub system_start: Vec<String>,
    pub system_end: Vec<String>,
}

impl SelectorResult {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.system_start.is_empty() && self.system_end.is_empty()
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    specificity: (bool, usize, usize),
    matcher: AndMatcher,
}

#[derive(Debug, Default)]
pub struct FlowSelector {
    user: Vec<Entry>,
    system_start: Vec<Entry>,
    system_end: Vec<Entry>,
    names: HashSet<String>,
}

impl FlowSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow under its filter.
    pub fn add_flow(&mut self, flow: &FlowRepresentation) -> Result<(), SelectorError> {
        let filter: &Filter = flow.filter();
        if filter.url.trim().is_empty() {
            return Err(SelectorError::EmptyFilter(flow.name().to_string()));
        }
        if !self.names.insert(flow.name().to_string()) {
            return Err(SelectorError::DuplicateFlow(flow.name().to_string()));
        }

        let entry = Entry {
            name: flow.name().to_string(),
            specificity: filter.specificity(),
            matcher: filter.matcher(),
        };
        let bucket = match flow.flow_type() {
            FlowType::User => &mut self.user,
            FlowType::SystemStart => &mut self.system_start,
            FlowType::SystemEnd => &mut self.system_end,
        };

        // Higher specificity first, ties broken by name.
        let position = bucket
            .binary_search_by(|existing| {
                entry
                    .specificity
                    .cmp(&existing.specificity)
                    .then_with(|| existing.name.cmp(&entry.name))
            })
            .unwrap_or_else(|pos| pos);
        bucket.insert(position, entry);

        tracing::debug!(flow = %flow.name(), flow_type = %flow.flow_type(), filter = %filter.label(), "Flow registered in selector");
        Ok(())
    }

    /// Flows whose filter matches `stream`, and whether any did.
    pub fn get_flow(&self, stream: &ApiStream) -> (SelectorResult, bool) {
        let matching = |entries: &[Entry]| -> Vec<String> {
            entries
                .iter()
                .filter(|e| e.matcher.matches(stream))
                .map(|e| e.name.clone())
                .collect()
        };

        let result = SelectorResult {
            user: matching(&self.user),
            system_start: matching(&self.system_start),
            system_end: matching(&self.system_end),
        };
        let found = !result.is_empty();
        (result, found)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
