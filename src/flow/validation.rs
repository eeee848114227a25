//! Structural validation of a flow representation.
//!
//! # Responsibilities
//! - Reject endpoints that cannot appear on their side of an edge
//! - Check that every referenced processor key is defined
//! - Enforce exactly one Start edge per defined direction
//! - Reject ambiguous branching (two edges with the same condition from one node)
//! - Reject cycles and processors no edge mentions
//!
//! # Design Decisions
//! - Pure function over the representation; cross-flow references are checked
//!   later, when the full snapshot is known
//! - Returns the first error found, in the order listed above

use std::collections::{HashMap, HashSet};

use crate::flow::connection::{Anchor, Connection, Direction, Endpoint};
use crate::flow::error::FlowError;
use crate::flow::representation::FlowRepresentation;

/// Validate `flow`, returning the first structural error.
pub fn validate_flow(flow: &FlowRepresentation) -> Result<(), FlowError> {
    let mut connected: HashSet<&str> = HashSet::new();
    let mut defined_directions = 0;

    for direction in Direction::ALL {
        let Some(edges) = flow.connections(direction).filter(|e| !e.is_empty()) else {
            continue;
        };
        defined_directions += 1;

        for edge in edges {
            check_endpoints(flow, edge)?;
            for endpoint in [&edge.from, &edge.to] {
                if let Some(key) = endpoint.processor_key() {
                    connected.insert(key);
                }
            }
        }

        check_root(flow, direction, edges)?;
        check_conditions(flow, edges)?;
        check_cycles(flow, direction, edges)?;
    }

    if defined_directions == 0 {
        return Err(FlowError::Empty(flow.name().to_string()));
    }

    if let Some(key) = flow.processors().keys().find(|k| !connected.contains(k.as_str())) {
        return Err(FlowError::UnconnectedProcessor {
            flow: flow.name().to_string(),
            key: key.clone(),
        });
    }

    Ok(())
}

fn check_endpoints(flow: &FlowRepresentation, edge: &Connection) -> Result<(), FlowError> {
    let invalid = |detail: String| FlowError::InvalidEndpoint {
        flow: flow.name().to_string(),
        detail,
    };

    if edge.from.is_anchor(Anchor::End) {
        return Err(invalid(format!("{} starts at the end anchor", edge)));
    }
    if edge.to.is_anchor(Anchor::Start) {
        return Err(invalid(format!("{} points at the start anchor", edge)));
    }

    for endpoint in [&edge.from, &edge.to] {
        match endpoint {
            Endpoint::Stream(_) => {}
            Endpoint::Processor { key, .. } => {
                if !flow.processors().contains_key(key) {
                    return Err(FlowError::UnknownProcessor {
                        flow: flow.name().to_string(),
                        key: key.clone(),
                    });
                }
            }
            Endpoint::Flow { name, .. } => {
                if name == flow.name() {
                    return Err(invalid(format!("{} references its own flow", edge)));
                }
            }
        }
    }
    Ok(())
}

fn check_root(flow: &FlowRepresentation, direction: Direction, edges: &[Connection]) -> Result<(), FlowError> {
    match edges.iter().filter(|e| e.from.is_anchor(Anchor::Start)).count() {
        0 => Err(FlowError::NoRoot {
            flow: flow.name().to_string(),
            direction,
        }),
        1 => Ok(()),
        _ => Err(FlowError::MultipleStartEdges {
            flow: flow.name().to_string(),
            direction,
        }),
    }
}

fn check_conditions(flow: &FlowRepresentation, edges: &[Connection]) -> Result<(), FlowError> {
    let mut seen: HashSet<(String, &str)> = HashSet::new();
    for edge in edges {
        let source = match &edge.from {
            Endpoint::Processor { key, .. } => key.clone(),
            Endpoint::Flow { name, .. } => format!("flow:{}", name),
            Endpoint::Stream(_) => continue,
        };
        if !seen.insert((source.clone(), edge.condition())) {
            return Err(FlowError::DuplicateCondition {
                flow: flow.name().to_string(),
                source_node: source,
                condition: edge.condition().to_string(),
            });
        }
    }
    Ok(())
}

fn check_cycles(flow: &FlowRepresentation, direction: Direction, edges: &[Connection]) -> Result<(), FlowError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if let (Some(from), Some(to)) = (edge.from.processor_key(), edge.to.processor_key()) {
            adjacency.entry(from).or_default().push(to);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<&'a str> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::InProgress) => return Some(node),
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        for next in adjacency.get(node).into_iter().flatten() {
            if let Some(cycle_at) = visit(*next, adjacency, marks) {
                return Some(cycle_at);
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut roots: Vec<&str> = adjacency.keys().copied().collect();
    roots.sort_unstable();
    for root in roots {
        if let Some(key) = visit(root, &adjacency, &mut marks) {
            return Err(FlowError::Cycle {
                flow: flow.name().to_string(),
                direction,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}
