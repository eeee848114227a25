//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check identifiers are present and unique
//! - Validate value ranges (quota windows > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Graph structure is checked when the snapshot is built, not here

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} #{index} has no {field}")]
    MissingField {
        kind: &'static str,
        index: usize,
        field: &'static str,
    },

    #[error("{kind} {id} is defined more than once")]
    Duplicate { kind: &'static str, id: String },

    #[error("{kind} {id} has no filter URL")]
    MissingFilter { kind: &'static str, id: String },

    #[error("quota {0} must have a window greater than zero")]
    ZeroWindow(String),

    #[error("metrics channel capacity must be greater than zero")]
    ZeroChannelCapacity,

    #[error("invalid prometheus address {0}")]
    InvalidAddress(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut flow_names = HashSet::new();
    for (index, flow) in config.flows.iter().enumerate() {
        if flow.name.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                kind: "flow",
                index,
                field: "name",
            });
            continue;
        }
        if !flow_names.insert(flow.name.as_str()) {
            errors.push(ValidationError::Duplicate {
                kind: "flow",
                id: flow.name.clone(),
            });
        }
        if flow.filter.url.trim().is_empty() {
            errors.push(ValidationError::MissingFilter {
                kind: "flow",
                id: flow.name.clone(),
            });
        }
    }

    let mut resource_ids = HashSet::new();
    for (index, resource) in config.resources.iter().enumerate() {
        if resource.id.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                kind: "resource",
                index,
                field: "id",
            });
            continue;
        }
        if !resource_ids.insert(resource.id.as_str()) {
            errors.push(ValidationError::Duplicate {
                kind: "resource",
                id: resource.id.clone(),
            });
        }
        if resource.filter.url.trim().is_empty() {
            errors.push(ValidationError::MissingFilter {
                kind: "resource",
                id: resource.id.clone(),
            });
        }
    }

    let mut quota_ids = HashSet::new();
    for (index, quota) in config.quotas.iter().enumerate() {
        if quota.id.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                kind: "quota",
                index,
                field: "id",
            });
            continue;
        }
        if !quota_ids.insert(quota.id.as_str()) {
            errors.push(ValidationError::Duplicate {
                kind: "quota",
                id: quota.id.clone(),
            });
        }
        if quota.window_seconds == 0 {
            errors.push(ValidationError::ZeroWindow(quota.id.clone()));
        }
    }

    if config.metrics.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }
    if let Some(address) = &config.metrics.prometheus_address {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress(address.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
