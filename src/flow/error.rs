//! Construction-time errors for flows and system flows.

use thiserror::Error;

use crate::flow::connection::{Anchor, Direction};

/// Errors raised while building or splicing a flow graph.
///
/// All of them reject the configuration version being loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("flow {flow}: invalid connection endpoint: {detail}")]
    InvalidEndpoint { flow: String, detail: String },

    #[error("flow {flow}: connection references unknown processor {key}")]
    UnknownProcessor { flow: String, key: String },

    #[error("processor with the key {0} already exists")]
    DuplicateProcessorKey(String),

    #[error("flow {flow}: {direction} graph has more than one edge leaving the start anchor")]
    MultipleStartEdges { flow: String, direction: Direction },

    #[error("flow {flow}: {direction} flow graph has no valid root node")]
    NoRoot { flow: String, direction: Direction },

    #[error("flow {flow}: {source_node} has more than one edge for condition {condition:?}")]
    DuplicateCondition {
        flow: String,
        source_node: String,
        condition: String,
    },

    #[error("flow {flow}: cycle detected in {direction} graph at processor {key}")]
    Cycle {
        flow: String,
        direction: Direction,
        key: String,
    },

    #[error("flow {flow}: processor {key} is not connected to any edge")]
    UnconnectedProcessor { flow: String, key: String },

    #[error("flow {flow}: connection references unknown flow {target}")]
    UnknownFlowReference { flow: String, target: String },

    #[error("flow {flow}: processor {key} ({processor}) cannot emit condition {condition:?}")]
    UnknownCondition {
        flow: String,
        key: String,
        processor: String,
        condition: String,
    },

    #[error("flow {flow}: {direction} graph has no edge at the {anchor} anchor to splice system flow {system_flow} into")]
    NoAnchorEdge {
        flow: String,
        system_flow: String,
        direction: Direction,
        anchor: Anchor,
    },

    #[error("flow {0} is defined more than once")]
    DuplicateFlow(String),

    #[error("resource {0} is defined more than once")]
    DuplicateResource(String),

    #[error("flow {0} has no edges in either direction")]
    Empty(String),
}
