//! The declarative flow: name, type, filter, processors and edges.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flow::connection::{Connection, Direction};
use crate::processors::params::ParamValue;
use crate::selector::Filter;

/// Who authored the flow and where it runs relative to user flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    User,
    SystemStart,
    SystemEnd,
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowType::User => write!(f, "UserFlow"),
            FlowType::SystemStart => write!(f, "SystemFlowStart"),
            FlowType::SystemEnd => write!(f, "SystemFlowEnd"),
        }
    }
}

/// Configuration of one processor instance inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Registered processor type, e.g. `GenerateResponse`.
    pub processor: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,

    /// Label names attached to this processor's metrics.
    #[serde(default)]
    pub metrics_labels: Vec<String>,
}

impl ProcessorConfig {
    pub fn new(processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            parameters: BTreeMap::new(),
            metrics_labels: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// A named processing pipeline with separate request and response graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRepresentation {
    name: String,
    flow_type: FlowType,
    filter: Filter,
    processors: BTreeMap<String, ProcessorConfig>,
    request: Option<Vec<Connection>>,
    response: Option<Vec<Connection>>,
}

impl FlowRepresentation {
    pub fn new(name: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            flow_type: FlowType::User,
            filter,
            processors: BTreeMap::new(),
            request: None,
            response: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn set_type(&mut self, flow_type: FlowType) {
        self.flow_type = flow_type;
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn processors(&self) -> &BTreeMap<String, ProcessorConfig> {
        &self.processors
    }

    /// Add a processor; returns the previous definition under the same key, if any.
    pub fn add_processor(&mut self, key: impl Into<String>, config: ProcessorConfig) -> Option<ProcessorConfig> {
        self.processors.insert(key.into(), config)
    }

    /// Edge list of `direction`, `None` when the direction is not defined.
    pub fn connections(&self, direction: Direction) -> Option<&[Connection]> {
        match direction {
            Direction::Request => self.request.as_deref(),
            Direction::Response => self.response.as_deref(),
        }
    }

    pub fn connections_mut(&mut self, direction: Direction) -> &mut Option<Vec<Connection>> {
        match direction {
            Direction::Request => &mut self.request,
            Direction::Response => &mut self.response,
        }
    }

    pub fn set_connections(&mut self, direction: Direction, connections: Option<Vec<Connection>>) {
        *self.connections_mut(direction) = connections;
    }

    pub fn with_connections(mut self, direction: Direction, connections: Vec<Connection>) -> Self {
        self.set_connections(direction, Some(connections));
        self
    }

    pub fn with_processor(mut self, key: impl Into<String>, config: ProcessorConfig) -> Self {
        self.add_processor(key, config);
        self
    }
}
