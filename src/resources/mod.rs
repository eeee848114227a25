//! Shared resources consumed by processors (quotas).
//!
//! # Responsibilities
//! - Hold every declared quota by id
//! - Hand quotas to processors at construction time
//!
//! # Design Decisions
//! - Concurrency discipline lives inside each quota, not in the engine
//! - Duplicate ids are rejected, never overwritten

pub mod quota;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

pub use quota::{FixedWindowQuota, Quota};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("quota {0} is defined more than once")]
    DuplicateQuota(String),

    #[error("quota {0} not found")]
    UnknownQuota(String),

    #[error("quota {id}: {reason}")]
    InvalidQuota { id: String, reason: String },
}

/// Resources of one configuration version.
#[derive(Debug, Default)]
pub struct Resources {
    quotas: HashMap<String, Arc<dyn Quota>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_quota(&mut self, quota: Arc<dyn Quota>) -> Result<(), ResourceError> {
        let id = quota.id().to_string();
        if self.quotas.contains_key(&id) {
            return Err(ResourceError::DuplicateQuota(id));
        }
        self.quotas.insert(id, quota);
        Ok(())
    }

    pub fn quota(&self, id: &str) -> Result<Arc<dyn Quota>, ResourceError> {
        self.quotas
            .get(id)
            .cloned()
            .ok_or_else(|| ResourceError::UnknownQuota(id.to_string()))
    }

    pub fn quota_ids(&self) -> impl Iterator<Item = &str> {
        self.quotas.keys().map(String::as_str)
    }
}
