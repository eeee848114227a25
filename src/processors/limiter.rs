//! `Limiter`: admit or reject against a shared quota.

use std::sync::Arc;

use async_trait::async_trait;

use crate::observability::metrics::processor_labels;
use crate::processors::error::ProcessorError;
use crate::processors::params::{ParamKind, ParamSpec};
use crate::processors::registry::{ProcessorDefinition, ProcessorMetadata};
use crate::processors::{Processor, ProcessorIO, StreamType};
use crate::resources::Quota;
use crate::runtime::stream::ApiStream;

const QUOTA_ID_PARAM: &str = "quota_id";

pub const BELOW_LIMIT_CONDITION: &str = "below_limit";
pub const ABOVE_LIMIT_CONDITION: &str = "above_limit";

const BELOW_COUNT_METRIC: &str = "flow_gateway_limiter_processor_below_count";
const ABOVE_COUNT_METRIC: &str = "flow_gateway_limiter_processor_above_count";

pub fn definition() -> ProcessorDefinition {
    ProcessorDefinition::new(
        "Limiter",
        vec![ParamSpec::required(QUOTA_ID_PARAM, ParamKind::String)],
        |metadata| Ok(Arc::new(LimiterProcessor::new(metadata)?) as Arc<dyn Processor>),
    )
    .with_conditions(&[BELOW_LIMIT_CONDITION, ABOVE_LIMIT_CONDITION])
}

#[derive(Debug)]
pub struct LimiterProcessor {
    name: String,
    quota: Arc<dyn Quota>,
    metrics_labels: Vec<String>,
}

impl LimiterProcessor {
    pub fn new(metadata: ProcessorMetadata) -> Result<Self, ProcessorError> {
        let quota_id = metadata.params.string(QUOTA_ID_PARAM)?;
        let quota = metadata
            .resources
            .quota(&quota_id)
            .map_err(|_| ProcessorError::UnknownQuota {
                quota: quota_id,
                processor: metadata.name.clone(),
            })?;

        Ok(Self {
            quota,
            metrics_labels: metadata.metrics_labels,
            name: metadata.name,
        })
    }
}

#[async_trait]
impl Processor for LimiterProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, flow_name: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
        if stream.stream_type() != StreamType::Request {
            return Err(ProcessorError::Execution {
                processor: self.name.clone(),
                reason: format!("invalid stream type: {}", stream.direction),
            });
        }

        let (condition, metric) = if self.quota.try_acquire(stream) {
            (BELOW_LIMIT_CONDITION, BELOW_COUNT_METRIC)
        } else {
            (ABOVE_LIMIT_CONDITION, ABOVE_COUNT_METRIC)
        };

        tracing::debug!(processor = %self.name, quota = %self.quota.id(), condition, "Quota checked");
        let labels = processor_labels(&self.metrics_labels, flow_name, &self.name, stream);
        metrics::counter!(metric, labels).increment(1);

        Ok(ProcessorIO::new(StreamType::Request, condition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::{Clock, MockClock};
    use crate::flow::ProcessorConfig;
    use crate::processors::ProcessorRegistry;
    use crate::resources::{FixedWindowQuota, Resources};

    fn setup(limit: u64) -> (Arc<MockClock>, Arc<dyn Processor>) {
        let clock = Arc::new(MockClock::new());
        let mut resources = Resources::new();
        resources
            .add_quota(Arc::new(
                FixedWindowQuota::new("q1", limit, Duration::from_secs(60), None, clock.clone() as Arc<dyn Clock>)
                    .unwrap(),
            ))
            .unwrap();

        let processor = ProcessorRegistry::with_builtins(clock.clone())
            .create(
                "limit",
                &ProcessorConfig::new("Limiter").with_param("quota_id", "q1"),
                &Arc::new(resources),
            )
            .unwrap();
        (clock, processor)
    }

    #[tokio::test]
    async fn test_below_then_above_limit() {
        let (_clock, limiter) = setup(2);
        let mut stream = ApiStream::request("GET", "api.example.com/");

        let conditions: Vec<String> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(limiter.execute("f", &mut stream).await.unwrap().name);
            }
            out
        };
        assert_eq!(conditions, vec![BELOW_LIMIT_CONDITION, BELOW_LIMIT_CONDITION, ABOVE_LIMIT_CONDITION]);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let (clock, limiter) = setup(1);
        let mut stream = ApiStream::request("GET", "api.example.com/");

        assert_eq!(limiter.execute("f", &mut stream).await.unwrap().name, BELOW_LIMIT_CONDITION);
        assert_eq!(limiter.execute("f", &mut stream).await.unwrap().name, ABOVE_LIMIT_CONDITION);

        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.execute("f", &mut stream).await.unwrap().name, BELOW_LIMIT_CONDITION);
    }

    #[tokio::test]
    async fn test_rejects_response_stream() {
        let (_clock, limiter) = setup(1);
        let mut stream = ApiStream::response_to(&ApiStream::request("GET", "api.example.com/"), 200);
        assert!(matches!(
            limiter.execute("f", &mut stream).await,
            Err(ProcessorError::Execution { .. })
        ));
    }

    #[test]
    fn test_unknown_quota() {
        let err = ProcessorRegistry::with_builtins(Arc::new(MockClock::new()))
            .create(
                "limit",
                &ProcessorConfig::new("Limiter").with_param("quota_id", "missing"),
                &Arc::new(Resources::new()),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ProcessorError::UnknownQuota {
                quota: "missing".into(),
                processor: "limit".into()
            }
        );
    }
}
