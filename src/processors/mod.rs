//! Processor contract and built-in processors.
//!
//! # Responsibilities
//! - Define the uniform `Processor` interface invoked by the runtime
//! - Define `ProcessorIO`, the condition label plus optional actions
//! - Build processor instances from configuration (`registry`)
//!
//! # Design Decisions
//! - Processors are async and may suspend (e.g. retry cooldowns)
//! - A processor never aborts a walk; errors become the `failure` condition
//! - Requirements are hints for body buffering, not correctness constraints

pub mod error;
pub mod filter;
pub mod generate_response;
pub mod limiter;
pub mod params;
pub mod registry;
pub mod retry;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::runtime::actions::Action;
use crate::runtime::stream::ApiStream;

pub use error::ProcessorError;
pub use params::{ParamKind, ParamSpec, ParamValue, Params};
pub use registry::{ProcessorDefinition, ProcessorMetadata, ProcessorRegistry};

/// Condition emitted when a processor returns an error.
pub const FAILURE_CONDITION: &str = "failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Request,
    Response,
    Any,
}

/// What a processor needs the transport to retain before it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorRequirement {
    pub body_required: bool,
    pub request_capture_required: bool,
}

impl ProcessorRequirement {
    pub fn merge(self, other: ProcessorRequirement) -> Self {
        Self {
            body_required: self.body_required || other.body_required,
            request_capture_required: self.request_capture_required || other.request_capture_required,
        }
    }
}

/// Result of one processor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorIO {
    pub stream_type: StreamType,
    /// Condition label; empty selects the default edge.
    pub name: String,
    pub request_action: Option<Action>,
    pub response_action: Option<Action>,
    pub failure: bool,
}

impl ProcessorIO {
    pub fn new(stream_type: StreamType, name: impl Into<String>) -> Self {
        Self {
            stream_type,
            name: name.into(),
            request_action: None,
            response_action: None,
            failure: false,
        }
    }

    /// Unconditional result with no actions.
    pub fn pass(stream_type: StreamType) -> Self {
        Self::new(stream_type, "")
    }

    pub fn failure(stream_type: StreamType) -> Self {
        Self {
            failure: true,
            ..Self::new(stream_type, FAILURE_CONDITION)
        }
    }

    pub fn with_request_action(mut self, action: Action) -> Self {
        self.request_action = Some(action);
        self
    }

    pub fn with_response_action(mut self, action: Action) -> Self {
        self.response_action = Some(action);
        self
    }

    /// True when either action ends the current walk.
    pub fn is_short_circuit(&self) -> bool {
        self.request_action.as_ref().map(Action::is_short_circuit).unwrap_or(false)
            || self.response_action.as_ref().map(Action::is_short_circuit).unwrap_or(false)
    }
}

/// A single processing step.
#[async_trait]
pub trait Processor: Send + Sync + Debug {
    /// Processor key as written in the flow.
    fn name(&self) -> &str;

    fn requirement(&self) -> ProcessorRequirement {
        ProcessorRequirement::default()
    }

    async fn execute(&self, flow_name: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError>;
}
