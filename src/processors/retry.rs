//! `Retry`: ask the transport to resend the request after a cooldown.
//!
//! The attempt counter lives in the flow context keyed by sequence id, so every
//! resend of the same logical request sees the previous count.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clock::Clock;
use crate::observability::metrics::processor_labels;
use crate::processors::error::ProcessorError;
use crate::processors::params::{ParamKind, ParamSpec};
use crate::processors::registry::{ProcessorDefinition, ProcessorMetadata};
use crate::processors::{Processor, ProcessorIO, ProcessorRequirement};
use crate::runtime::actions::Action;
use crate::runtime::stream::ApiStream;

const ATTEMPTS_PARAM: &str = "attempts";
const COOLDOWN_PARAM: &str = "cooldown_between_attempts_seconds";
const MULTIPLIER_PARAM: &str = "cooldown_multiplier";
const MAXIMUM_COOLDOWN_PARAM: &str = "maximum_cooldown_seconds";

pub const RETRY_CONDITION: &str = "retry";
pub const FAILED_CONDITION: &str = "failed";

const RETRY_COUNT_METRIC: &str = "flow_gateway_retry_processor_retry_count";
const FAILED_RETRY_COUNT_METRIC: &str = "flow_gateway_retry_processor_failed_retry_count";

pub fn definition() -> ProcessorDefinition {
    ProcessorDefinition::new(
        "Retry",
        vec![
            ParamSpec::required(ATTEMPTS_PARAM, ParamKind::Number),
            ParamSpec::optional(COOLDOWN_PARAM, ParamKind::Number).with_default(0i64),
            ParamSpec::optional(MULTIPLIER_PARAM, ParamKind::Number).with_default(0i64),
            ParamSpec::optional(MAXIMUM_COOLDOWN_PARAM, ParamKind::Number).with_default(0i64),
        ],
        |metadata| Ok(Arc::new(RetryProcessor::new(metadata)?) as Arc<dyn Processor>),
    )
    .with_conditions(&[RETRY_CONDITION, FAILED_CONDITION])
}

#[derive(Debug)]
pub struct RetryProcessor {
    name: String,
    attempts: u64,
    cooldown: f64,
    multiplier: f64,
    /// Zero means uncapped.
    maximum_cooldown: f64,
    clock: Arc<dyn Clock>,
    metrics_labels: Vec<String>,
}

impl RetryProcessor {
    pub fn new(metadata: ProcessorMetadata) -> Result<Self, ProcessorError> {
        let invalid = |reason: &str| ProcessorError::InvalidConfig {
            processor: metadata.name.clone(),
            reason: reason.to_string(),
        };

        let attempts = metadata.params.integer(ATTEMPTS_PARAM)?;
        if attempts < 1 {
            return Err(invalid("attempts must be greater than 0"));
        }

        let cooldown = metadata.params.number(COOLDOWN_PARAM)?;
        let multiplier = metadata.params.number(MULTIPLIER_PARAM)?;
        let maximum_cooldown = metadata.params.number(MAXIMUM_COOLDOWN_PARAM)?;
        if cooldown < 0.0 || multiplier < 0.0 || maximum_cooldown < 0.0 {
            return Err(invalid("cooldown values must not be negative"));
        }

        Ok(Self {
            attempts: attempts as u64,
            cooldown,
            multiplier,
            maximum_cooldown,
            clock: metadata.clock,
            metrics_labels: metadata.metrics_labels,
            name: metadata.name,
        })
    }

    fn counter_key(&self, sequence_id: &str) -> String {
        format!("{}::retry_counter::{}", self.name, sequence_id)
    }

    /// Cooldown before the `attempt`-th resend, in whole seconds.
    pub fn cooldown_for(&self, attempt: u64) -> Duration {
        let mut seconds = self.cooldown + attempt as f64 * self.multiplier;
        if self.maximum_cooldown > 0.0 && seconds > self.maximum_cooldown {
            seconds = self.maximum_cooldown;
        }
        Duration::from_secs(seconds.trunc() as u64)
    }

    fn increment(&self, stream: &ApiStream, key: &str) -> u64 {
        let flow = &stream.context().flow;
        let current = flow.get(key).ok().and_then(|v| v.as_u64()).unwrap_or(0);
        flow.set(key, Value::from(current + 1));
        current + 1
    }
}

#[async_trait]
impl Processor for RetryProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirement(&self) -> ProcessorRequirement {
        ProcessorRequirement {
            body_required: false,
            request_capture_required: true,
        }
    }

    async fn execute(&self, flow_name: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
        let key = self.counter_key(&stream.sequence_id);
        let attempt = self.increment(stream, &key);
        let labels = processor_labels(&self.metrics_labels, flow_name, &self.name, stream);

        if attempt > self.attempts {
            if let Err(e) = stream.context().flow.pop(&key) {
                tracing::debug!(processor = %self.name, error = %e, "Failed to remove retry counter");
            }
            tracing::debug!(processor = %self.name, sequence_id = %stream.sequence_id, "Retry attempts exhausted");
            metrics::counter!(FAILED_RETRY_COUNT_METRIC, labels).increment(1);
            return Ok(ProcessorIO::new(stream.stream_type(), FAILED_CONDITION));
        }

        let cooldown = self.cooldown_for(attempt);
        tracing::debug!(processor = %self.name, attempt, ?cooldown, "Waiting before retry");

        tokio::select! {
            _ = self.clock.sleep(cooldown) => {}
            _ = stream.cancelled() => {
                return Err(ProcessorError::Cancelled(self.name.clone()));
            }
        }

        metrics::counter!(RETRY_COUNT_METRIC, labels).increment(1);
        Ok(ProcessorIO::new(stream.stream_type(), RETRY_CONDITION).with_response_action(Action::Retry))
    }
}
