//! A system-flow fragment and its anchor lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::{Connection, Direction, Endpoint, FlowError, FlowRepresentation, FlowType, ProcessorConfig};
use crate::selector::Filter;
use crate::system_flow::splicer::{splice, SplicePosition};

/// Name prefix of standalone flows generated from unreferenced fragments.
pub const TEMPLATE_FLOW_PREFIX: &str = "SystemFlow_";

/// Processor keys attached at the Start and End anchors of one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorProcessors {
    pub start: Vec<String>,
    pub end: Vec<String>,
}

impl AnchorProcessors {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.start.iter().chain(self.end.iter())
    }
}

/// Anchor lists for both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceFlow {
    pub request: AnchorProcessors,
    pub response: AnchorProcessors,
}

impl ResourceFlow {
    pub fn direction(&self, direction: Direction) -> &AnchorProcessors {
        match direction {
            Direction::Request => &self.request,
            Direction::Response => &self.response,
        }
    }

    fn direction_mut(&mut self, direction: Direction) -> &mut AnchorProcessors {
        match direction {
            Direction::Request => &mut self.request,
            Direction::Response => &mut self.response,
        }
    }
}

/// A flow fragment contributed by a resource declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemFlowRepresentation {
    id: String,
    filter: Filter,
    processors: BTreeMap<String, ProcessorConfig>,
    anchors: ResourceFlow,
    referenced: bool,
}

impl SystemFlowRepresentation {
    pub fn new(id: impl Into<String>, filter: Filter) -> Self {
        Self {
            id: id.into(),
            filter,
            processors: BTreeMap::new(),
            anchors: ResourceFlow::default(),
            referenced: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn processors(&self) -> &BTreeMap<String, ProcessorConfig> {
        &self.processors
    }

    pub fn anchors(&self) -> &ResourceFlow {
        &self.anchors
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    pub fn mark_referenced(&mut self) {
        self.referenced = true;
    }

    /// Add a resource's processors and anchor lists to this fragment.
    ///
    /// Fails without modifying the fragment if a key is already present, if an
    /// anchor names an undefined processor, or if a processor is never anchored.
    pub fn add_system_flow(
        &mut self,
        processors: &BTreeMap<String, ProcessorConfig>,
        anchors: &ResourceFlow,
    ) -> Result<(), FlowError> {
        if let Some(key) = processors.keys().find(|k| self.processors.contains_key(*k)) {
            return Err(FlowError::DuplicateProcessorKey(key.clone()));
        }

        for direction in Direction::ALL {
            if let Some(key) = anchors.direction(direction).keys().find(|k| !processors.contains_key(*k)) {
                return Err(FlowError::UnknownProcessor {
                    flow: self.id.clone(),
                    key: key.clone(),
                });
            }
        }

        let anchored = |key: &String| {
            Direction::ALL
                .iter()
                .any(|d| anchors.direction(*d).keys().any(|k| k == key))
        };
        if let Some(key) = processors.keys().find(|k| !anchored(*k)) {
            return Err(FlowError::UnconnectedProcessor {
                flow: self.id.clone(),
                key: key.clone(),
            });
        }

        self.processors
            .extend(processors.iter().map(|(k, v)| (k.clone(), v.clone())));
        for direction in Direction::ALL {
            let incoming = anchors.direction(direction);
            let current = self.anchors.direction_mut(direction);
            current.start.extend(incoming.start.iter().cloned());
            current.end.extend(incoming.end.iter().cloned());
        }
        Ok(())
    }

    /// Fold another fragment with the same filter into this one.
    pub fn merge(&mut self, other: &SystemFlowRepresentation) -> Result<(), FlowError> {
        self.add_system_flow(&other.processors, &other.anchors)
    }

    /// Minimal `Start -> End` flow in both directions, named after this fragment.
    pub fn flow_template(&self, kind: FlowType) -> FlowRepresentation {
        let mut flow = FlowRepresentation::new(
            format!("{}{}_{}", TEMPLATE_FLOW_PREFIX, self.id, kind),
            self.filter.clone(),
        );
        flow.set_type(kind);
        for direction in Direction::ALL {
            flow.set_connections(
                direction,
                Some(vec![Connection::new(Endpoint::start(), Endpoint::end())]),
            );
        }
        flow
    }

    /// Standalone flow running the Start-anchored processors, if there are any.
    pub fn generate_system_flow_start(&self) -> Result<Option<FlowRepresentation>, FlowError> {
        if Direction::ALL.iter().all(|d| self.anchors.direction(*d).start.is_empty()) {
            return Ok(None);
        }
        let mut flow = self.flow_template(FlowType::SystemStart);
        splice(&mut flow, self, SplicePosition::Start)?;
        Ok(Some(flow))
    }

    /// Standalone flow running the End-anchored processors, if there are any.
    pub fn generate_system_flow_end(&self) -> Result<Option<FlowRepresentation>, FlowError> {
        if Direction::ALL.iter().all(|d| self.anchors.direction(*d).end.is_empty()) {
            return Ok(None);
        }
        let mut flow = self.flow_template(FlowType::SystemEnd);
        splice(&mut flow, self, SplicePosition::End)?;
        Ok(Some(flow))
    }
}
