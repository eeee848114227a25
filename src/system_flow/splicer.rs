//! Splicing system-flow fragments into flows.
//!
//! Per direction, with `s` the Start-anchored keys and `e` the End-anchored keys:
//! ```text
//! before:  Start -> U1 -> ... -> Un -> End
//! after:   Start -> s0 -> ... -> s(k-1) -> U1 -> ... -> Un -> e0 -> ... -> e(m-1) -> End
//! ```
//! The existing Start edge keeps its target and gets `s(k-1)` as source; every
//! edge into `End` is redirected to `e0`.

use tracing::debug;

use crate::flow::{Anchor, Connection, Direction, Endpoint, FlowError, FlowRepresentation};
use crate::system_flow::representation::SystemFlowRepresentation;

/// Which anchor lists of a fragment a splice applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplicePosition {
    Both,
    Start,
    End,
}

impl SplicePosition {
    fn includes_start(self) -> bool {
        matches!(self, SplicePosition::Both | SplicePosition::Start)
    }

    fn includes_end(self) -> bool {
        matches!(self, SplicePosition::Both | SplicePosition::End)
    }
}

/// Splice `fragment` into `target`.
///
/// Fails with `DuplicateProcessorKey` before touching `target` if any processor
/// key to be copied is already defined there.
pub fn splice(
    target: &mut FlowRepresentation,
    fragment: &SystemFlowRepresentation,
    position: SplicePosition,
) -> Result<(), FlowError> {
    let mut keys: Vec<&String> = Vec::new();
    for direction in Direction::ALL {
        let anchors = fragment.anchors().direction(direction);
        if position.includes_start() {
            keys.extend(anchors.start.iter());
        }
        if position.includes_end() {
            keys.extend(anchors.end.iter());
        }
    }

    if let Some(key) = keys.iter().find(|k| target.processors().contains_key(k.as_str())) {
        return Err(FlowError::DuplicateProcessorKey((*key).clone()));
    }

    check_anchor_edges(target, fragment, position)?;

    for direction in Direction::ALL {
        let anchors = fragment.anchors().direction(direction);
        let start: &[String] = if position.includes_start() { &anchors.start } else { &[] };
        let end: &[String] = if position.includes_end() { &anchors.end } else { &[] };
        if start.is_empty() && end.is_empty() {
            continue;
        }

        let slot = target.connections_mut(direction);
        if slot.as_ref().map_or(true, |e| e.is_empty()) {
            *slot = Some(vec![Connection::new(Endpoint::start(), Endpoint::end())]);
        }
        let Some(edges) = slot.as_mut() else {
            continue;
        };

        splice_start(edges, start);
        splice_end(edges, end);
    }

    for key in keys {
        if let Some(config) = fragment.processors().get(key) {
            target.add_processor(key.clone(), config.clone());
        }
    }

    debug!(
        flow = %target.name(),
        system_flow = %fragment.id(),
        position = ?position,
        "Spliced system flow"
    );
    Ok(())
}

/// A non-empty direction must have a Start edge to splice before and an edge
/// into End to splice after; an empty direction gets `Start -> End`.
fn check_anchor_edges(
    target: &FlowRepresentation,
    fragment: &SystemFlowRepresentation,
    position: SplicePosition,
) -> Result<(), FlowError> {
    for direction in Direction::ALL {
        let Some(edges) = target.connections(direction).filter(|e| !e.is_empty()) else {
            continue;
        };
        let anchors = fragment.anchors().direction(direction);
        let required = [
            (Anchor::Start, position.includes_start() && !anchors.start.is_empty()),
            (Anchor::End, position.includes_end() && !anchors.end.is_empty()),
        ];
        for (anchor, needed) in required {
            let present = match anchor {
                Anchor::Start => edges.iter().any(|e| e.from.is_anchor(Anchor::Start)),
                Anchor::End => edges.iter().any(|e| e.to.is_anchor(Anchor::End)),
            };
            if needed && !present {
                return Err(FlowError::NoAnchorEdge {
                    flow: target.name().to_string(),
                    system_flow: fragment.id().to_string(),
                    direction,
                    anchor,
                });
            }
        }
    }
    Ok(())
}

fn splice_start(edges: &mut Vec<Connection>, start: &[String]) {
    let (Some(first), Some(last)) = (start.first(), start.last()) else {
        return;
    };
    let Some(root) = edges.iter_mut().find(|e| e.from.is_anchor(Anchor::Start)) else {
        return;
    };
    root.from = Endpoint::processor(last.clone());

    let mut chain = Vec::with_capacity(start.len());
    chain.push(Connection::new(Endpoint::start(), Endpoint::processor(first.clone())));
    for pair in start.windows(2) {
        chain.push(Connection::new(
            Endpoint::processor(pair[0].clone()),
            Endpoint::processor(pair[1].clone()),
        ));
    }
    let existing = std::mem::take(edges);
    edges.extend(chain);
    edges.extend(existing);
}

fn splice_end(edges: &mut Vec<Connection>, end: &[String]) {
    let (Some(first), Some(last)) = (end.first(), end.last()) else {
        return;
    };

    for edge in edges.iter_mut().filter(|e| e.to.is_anchor(Anchor::End)) {
        edge.to = Endpoint::processor(first.clone());
    }
    for pair in end.windows(2) {
        edges.push(Connection::new(
            Endpoint::processor(pair[0].clone()),
            Endpoint::processor(pair[1].clone()),
        ));
    }
    edges.push(Connection::new(Endpoint::processor(last.clone()), Endpoint::end()));
}

/// Fold fragments that share a filter into the first of them, in input order.
///
/// A processor key defined by two merged fragments is rejected here, whether or
/// not a user flow later picks the fragment up.
pub fn merge_by_filter(fragments: Vec<SystemFlowRepresentation>) -> Result<Vec<SystemFlowRepresentation>, FlowError> {
    let mut merged: Vec<SystemFlowRepresentation> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let key = fragment.filter().comparable();
        match merged.iter_mut().find(|m| m.filter().comparable() == key) {
            Some(existing) => {
                debug!(into = %existing.id(), system_flow = %fragment.id(), "Merging system flows sharing a filter");
                existing.merge(&fragment)?;
            }
            None => merged.push(fragment),
        }
    }
    Ok(merged)
}

/// Drop a response graph that is nothing but `Start -> End`.
pub fn prune_trivial_response(flow: &mut FlowRepresentation) {
    let trivial = matches!(
        flow.connections(Direction::Response),
        Some([only]) if only.from.is_anchor(Anchor::Start) && only.to.is_anchor(Anchor::End)
    );
    if trivial {
        flow.set_connections(Direction::Response, None);
    }
}

/// Splice every fragment into the user flows sharing its filter, then emit
/// standalone flows for fragments no user flow picked up.
///
/// Returned flows are user flows (in input order) followed by the generated
/// system flows.
pub fn attach_system_flows(
    user_flows: Vec<FlowRepresentation>,
    fragments: &mut [SystemFlowRepresentation],
) -> Result<Vec<FlowRepresentation>, FlowError> {
    let mut flows = Vec::with_capacity(user_flows.len());

    for mut flow in user_flows {
        let key = flow.filter().comparable();
        for fragment in fragments.iter_mut() {
            if fragment.filter().comparable() == key {
                splice(&mut flow, fragment, SplicePosition::Both)?;
                fragment.mark_referenced();
            }
        }
        prune_trivial_response(&mut flow);
        flows.push(flow);
    }

    for fragment in fragments.iter().filter(|f| !f.is_referenced()) {
        debug!(system_flow = %fragment.id(), "Attaching standalone system flow");
        for mut generated in [fragment.generate_system_flow_start()?, fragment.generate_system_flow_end()?]
            .into_iter()
            .flatten()
        {
            prune_trivial_response(&mut generated);
            flows.push(generated);
        }
    }

    Ok(flows)
}
