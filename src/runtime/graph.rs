//! Compiled flow graphs and the immutable snapshot the engine walks.
//!
//! # Responsibilities
//! - Compile each `FlowRepresentation` into an index-addressed arena per direction
//! - Resolve flow references against the complete set of flows
//! - Reject edge conditions the source processor type never emits
//! - Build every processor once per flow and aggregate their requirements
//! - Assemble the `FlowSelector` for the version
//!
//! # Design Decisions
//! - Nodes live in a `Vec`; edges hold `NodeId`s, never references
//! - Edges keep declaration order so "first matching edge" is well defined
//! - A snapshot is never mutated after `build`; reload replaces it whole

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::flow::{validate_flow, Anchor, Direction, Endpoint, FlowError, FlowRepresentation, FlowType};
use crate::processors::{Processor, ProcessorError, ProcessorRegistry, ProcessorRequirement};
use crate::resources::{ResourceError, Resources};
use crate::selector::{FlowSelector, SelectorError};
use crate::system_flow::{attach_system_flows, merge_by_filter, SystemFlowRepresentation};

/// Anything that rejects a configuration version.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("flow {flow}: {source}")]
    Processor {
        flow: String,
        #[source]
        source: ProcessorError,
    },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Where an edge leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    End,
    Flow(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub condition: String,
    pub target: Target,
}

#[derive(Debug)]
pub struct Node {
    pub key: String,
    pub processor: Arc<dyn Processor>,
    pub edges: Vec<Edge>,
}

/// One direction of a compiled flow.
#[derive(Debug, Default)]
pub struct DirectionGraph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    root: Option<Edge>,
    /// Entry edges used when another flow jumps into this one, keyed by the caller.
    entries: HashMap<String, Edge>,
}

impl DirectionGraph {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn root(&self) -> Option<&Edge> {
        self.root.as_ref()
    }

    /// Entry for a walk arriving from `caller`, falling back to the root.
    pub fn entry_from(&self, caller: &str) -> Option<&Edge> {
        self.entries.get(caller).or(self.root.as_ref())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn intern(&mut self, key: &str, processors: &HashMap<String, Arc<dyn Processor>>, flow: &str) -> Result<NodeId, FlowError> {
        if let Some(id) = self.index.get(key) {
            return Ok(*id);
        }
        let processor = processors.get(key).ok_or_else(|| FlowError::UnknownProcessor {
            flow: flow.to_string(),
            key: key.to_string(),
        })?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            key: key.to_string(),
            processor: processor.clone(),
            edges: Vec::new(),
        });
        self.index.insert(key.to_string(), id);
        Ok(id)
    }
}

/// A flow compiled for execution.
#[derive(Debug)]
pub struct FlowGraph {
    name: String,
    flow_type: FlowType,
    request: Option<DirectionGraph>,
    response: Option<DirectionGraph>,
    requirement: ProcessorRequirement,
}

impl FlowGraph {
    /// Compile `flow` using already constructed processor instances.
    pub fn compile(
        flow: &FlowRepresentation,
        processors: &HashMap<String, Arc<dyn Processor>>,
    ) -> Result<Self, FlowError> {
        let mut directions = [None, None];
        for (slot, direction) in directions.iter_mut().zip(Direction::ALL) {
            let Some(edges) = flow.connections(direction).filter(|e| !e.is_empty()) else {
                continue;
            };

            let mut graph = DirectionGraph::default();
            for connection in edges {
                let target = match &connection.to {
                    Endpoint::Stream(Anchor::End) => Target::End,
                    Endpoint::Stream(Anchor::Start) => {
                        return Err(FlowError::InvalidEndpoint {
                            flow: flow.name().to_string(),
                            detail: format!("{} points at the start anchor", connection),
                        })
                    }
                    Endpoint::Processor { key, .. } => Target::Node(graph.intern(key, processors, flow.name())?),
                    Endpoint::Flow { name, .. } => Target::Flow(name.clone()),
                };
                let edge = Edge {
                    condition: connection.condition().to_string(),
                    target,
                };

                match &connection.from {
                    Endpoint::Stream(Anchor::Start) => graph.root = Some(edge),
                    Endpoint::Stream(Anchor::End) => {
                        return Err(FlowError::InvalidEndpoint {
                            flow: flow.name().to_string(),
                            detail: format!("{} starts at the end anchor", connection),
                        })
                    }
                    Endpoint::Processor { key, .. } => {
                        let id = graph.intern(key, processors, flow.name())?;
                        graph.nodes[id.0].edges.push(edge);
                    }
                    Endpoint::Flow { name, .. } => {
                        graph.entries.insert(name.clone(), edge);
                    }
                }
            }

            if graph.root.is_none() {
                return Err(FlowError::NoRoot {
                    flow: flow.name().to_string(),
                    direction,
                });
            }
            *slot = Some(graph);
        }

        let [request, response] = directions;
        let requirement = processors
            .values()
            .map(|p| p.requirement())
            .fold(ProcessorRequirement::default(), ProcessorRequirement::merge);

        Ok(Self {
            name: flow.name().to_string(),
            flow_type: flow.flow_type(),
            request,
            response,
            requirement,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn direction(&self, direction: Direction) -> Option<&DirectionGraph> {
        match direction {
            Direction::Request => self.request.as_ref(),
            Direction::Response => self.response.as_ref(),
        }
    }

    pub fn requirement(&self) -> ProcessorRequirement {
        self.requirement
    }
}

/// Everything one configuration version needs at request time.
#[derive(Debug)]
pub struct FlowSnapshot {
    flows: HashMap<String, Arc<FlowGraph>>,
    selector: FlowSelector,
    resources: Arc<Resources>,
}

impl FlowSnapshot {
    /// Snapshot with no flows; every transaction passes through untouched.
    pub fn empty() -> Self {
        Self {
            flows: HashMap::new(),
            selector: FlowSelector::new(),
            resources: Arc::new(Resources::new()),
        }
    }

    /// Validate, splice, construct processors and compile every flow.
    pub fn build(
        user_flows: Vec<FlowRepresentation>,
        fragments: Vec<SystemFlowRepresentation>,
        resources: Arc<Resources>,
        registry: &ProcessorRegistry,
    ) -> Result<Self, BuildError> {
        let mut seen = HashSet::new();
        for flow in &user_flows {
            if !seen.insert(flow.name().to_string()) {
                return Err(FlowError::DuplicateFlow(flow.name().to_string()).into());
            }
            validate_flow(flow)?;
        }

        let mut fragments = merge_by_filter(fragments)?;
        let flows = attach_system_flows(user_flows, &mut fragments)?;
        let names: HashSet<&str> = flows.iter().map(|f| f.name()).collect();
        for flow in &flows {
            validate_flow(flow)?;
            check_flow_references(flow, &names)?;
            check_conditions(flow, registry)?;
        }

        let mut selector = FlowSelector::new();
        let mut compiled = HashMap::with_capacity(flows.len());
        for flow in &flows {
            let processors = flow
                .processors()
                .iter()
                .map(|(key, config)| {
                    registry
                        .create(key, config, &resources)
                        .map(|p| (key.clone(), p))
                        .map_err(|source| BuildError::Processor {
                            flow: flow.name().to_string(),
                            source,
                        })
                })
                .collect::<Result<HashMap<_, _>, _>>()?;

            let graph = FlowGraph::compile(flow, &processors)?;
            selector.add_flow(flow)?;
            compiled.insert(flow.name().to_string(), Arc::new(graph));
        }

        tracing::debug!(flows = compiled.len(), "Flow snapshot built");
        Ok(Self {
            flows: compiled,
            selector,
            resources,
        })
    }

    pub fn flow(&self, name: &str) -> Option<&Arc<FlowGraph>> {
        self.flows.get(name)
    }

    pub fn flow_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.flows.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn selector(&self) -> &FlowSelector {
        &self.selector
    }

    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    /// Merged processor requirements per flow, by name.
    pub fn requirements(&self) -> BTreeMap<String, ProcessorRequirement> {
        self.flows
            .iter()
            .map(|(name, graph)| (name.clone(), graph.requirement()))
            .collect()
    }
}

fn check_flow_references(flow: &FlowRepresentation, names: &HashSet<&str>) -> Result<(), FlowError> {
    for direction in Direction::ALL {
        for connection in flow.connections(direction).unwrap_or_default() {
            for endpoint in [&connection.from, &connection.to] {
                if let Endpoint::Flow { name, .. } = endpoint {
                    if !names.contains(name.as_str()) {
                        return Err(FlowError::UnknownFlowReference {
                            flow: flow.name().to_string(),
                            target: name.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Reject edge conditions the source processor's type never emits.
fn check_conditions(flow: &FlowRepresentation, registry: &ProcessorRegistry) -> Result<(), FlowError> {
    for direction in Direction::ALL {
        for connection in flow.connections(direction).unwrap_or_default() {
            let Endpoint::Processor { key, condition } = &connection.from else {
                continue;
            };
            // Unknown types surface when the processor is created.
            let Some(definition) = flow
                .processors()
                .get(key)
                .and_then(|config| registry.definition(&config.processor))
            else {
                continue;
            };
            if !definition.check_condition(condition) {
                return Err(FlowError::UnknownCondition {
                    flow: flow.name().to_string(),
                    key: key.clone(),
                    processor: definition.name.clone(),
                    condition: condition.clone(),
                });
            }
        }
    }
    Ok(())
}
