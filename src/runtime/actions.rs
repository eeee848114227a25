//! Side-effect instructions returned to the transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::Direction;

/// Changes to apply to the in-flight request or response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modification {
    pub set_headers: BTreeMap<String, String>,
    pub remove_headers: Vec<String>,
    pub body: Option<String>,
    pub path: Option<String>,
}

/// A request the transport should issue in place of the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// A response returned to the client without reaching the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyResponse {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    NoOp,
    Modify(Modification),
    Generate(GeneratedRequest),
    EarlyResponse(EarlyResponse),
    Retry,
}

impl Action {
    /// Early responses and retries end the walk of the direction that produced them.
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Action::EarlyResponse(_) | Action::Retry)
    }
}

/// Actions collected during a transaction, in visitation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamActions {
    pub request: Vec<Action>,
    pub response: Vec<Action>,
}

impl StreamActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an action for `side`. No-ops are not recorded.
    pub fn push(&mut self, side: Direction, action: Action) {
        if action == Action::NoOp {
            return;
        }
        match side {
            Direction::Request => self.request.push(action),
            Direction::Response => self.response.push(action),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty()
    }

    /// First early response produced on the request side, if any.
    pub fn early_response(&self) -> Option<&EarlyResponse> {
        self.request.iter().find_map(|action| match action {
            Action::EarlyResponse(response) => Some(response),
            _ => None,
        })
    }

    pub fn wants_retry(&self) -> bool {
        self.response.contains(&Action::Retry)
    }
}
