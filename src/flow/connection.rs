//! Graph edges and their endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Boundary of a direction's sub-graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Start,
    End,
}

/// Which half of a transaction a sub-graph handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Request, Direction::Response];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => write!(f, "request"),
            Direction::Response => write!(f, "response"),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Start => write!(f, "start"),
            Anchor::End => write!(f, "end"),
        }
    }
}

/// One side of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The global stream boundary of the current direction.
    Stream(Anchor),
    /// A processor of the owning flow. `condition` only matters on the source side.
    Processor { key: String, condition: String },
    /// Another flow's sub-graph of the same direction.
    Flow { name: String, at: Anchor },
}

impl Endpoint {
    pub fn start() -> Self {
        Endpoint::Stream(Anchor::Start)
    }

    pub fn end() -> Self {
        Endpoint::Stream(Anchor::End)
    }

    pub fn processor(key: impl Into<String>) -> Self {
        Endpoint::Processor {
            key: key.into(),
            condition: String::new(),
        }
    }

    pub fn processor_when(key: impl Into<String>, condition: impl Into<String>) -> Self {
        Endpoint::Processor {
            key: key.into(),
            condition: condition.into(),
        }
    }

    pub fn flow(name: impl Into<String>, at: Anchor) -> Self {
        Endpoint::Flow {
            name: name.into(),
            at,
        }
    }

    pub fn is_anchor(&self, anchor: Anchor) -> bool {
        matches!(self, Endpoint::Stream(a) if *a == anchor)
    }

    pub fn processor_key(&self) -> Option<&str> {
        match self {
            Endpoint::Processor { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Stream(anchor) => write!(f, "GlobalStream@{}", anchor),
            Endpoint::Processor { key, condition } if condition.is_empty() => write!(f, "{}", key),
            Endpoint::Processor { key, condition } => write!(f, "{}[{}]", key, condition),
            Endpoint::Flow { name, at } => write!(f, "flow:{}@{}", name, at),
        }
    }
}

/// A directed edge `from -> to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: Endpoint,
    pub to: Endpoint,
}

impl Connection {
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }

    /// Condition label that selects this edge; empty for the default edge.
    pub fn condition(&self) -> &str {
        match &self.from {
            Endpoint::Processor { condition, .. } => condition,
            _ => "",
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
