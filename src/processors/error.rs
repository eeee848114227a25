//! Processor errors.

use thiserror::Error;

use crate::context::ContextError;
use crate::processors::params::ParamKind;

/// Errors raised while constructing or executing a processor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessorError {
    #[error("param {param} is required in processor {processor}")]
    MissingParam { param: String, processor: String },

    #[error("param {param} in processor {processor} must be a {expected}")]
    InvalidParam {
        param: String,
        processor: String,
        expected: ParamKind,
    },

    #[error("processor {processor}: {reason}")]
    InvalidConfig { processor: String, reason: String },

    #[error("processor type {0} is not registered")]
    UnknownType(String),

    #[error("quota {quota} not found for processor {processor}")]
    UnknownQuota { quota: String, processor: String },

    #[error("processor {processor} failed: {reason}")]
    Execution { processor: String, reason: String },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("processor {0} was cancelled while waiting")]
    Cancelled(String),
}
