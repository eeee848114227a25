//! `GenerateResponse`: answer the client without reaching the upstream.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::observability::metrics::processor_labels;
use crate::processors::error::ProcessorError;
use crate::processors::params::{ParamKind, ParamSpec, ParamValue};
use crate::processors::registry::{ProcessorDefinition, ProcessorMetadata};
use crate::processors::{Processor, ProcessorIO};
use crate::runtime::actions::{Action, EarlyResponse};
use crate::runtime::stream::ApiStream;

const STATUS_PARAM: &str = "status";
const BODY_PARAM: &str = "body";
const GENERATED_RESPONSE_METRIC: &str = "flow_gateway_generated_response_count";

pub fn definition() -> ProcessorDefinition {
    ProcessorDefinition::new(
        "GenerateResponse",
        vec![
            ParamSpec::optional(STATUS_PARAM, ParamKind::Number).with_default(200i64),
            ParamSpec::optional(BODY_PARAM, ParamKind::String).with_default(""),
        ],
        |metadata| Ok(Arc::new(GenerateResponseProcessor::new(metadata)?) as Arc<dyn Processor>),
    )
    .with_conditions(&[])
}

/// Returns an early response built from its parameters.
///
/// Parameters other than `status` and `body` become response headers.
#[derive(Debug)]
pub struct GenerateResponseProcessor {
    name: String,
    status: u16,
    body: String,
    headers: BTreeMap<String, String>,
    metrics_labels: Vec<String>,
}

impl GenerateResponseProcessor {
    pub fn new(metadata: ProcessorMetadata) -> Result<Self, ProcessorError> {
        let status = metadata.params.integer(STATUS_PARAM)?;
        let status = u16::try_from(status)
            .ok()
            .filter(|s| (100..=599).contains(s))
            .ok_or_else(|| ProcessorError::InvalidConfig {
                processor: metadata.name.clone(),
                reason: format!("status {} is not a valid HTTP status", status),
            })?;

        let headers = metadata
            .params
            .extra()
            .iter()
            .filter_map(|(name, value)| match value {
                ParamValue::String(v) => Some((name.clone(), v.clone())),
                ParamValue::Number(n) => Some((name.clone(), n.to_string())),
                ParamValue::Bool(b) => Some((name.clone(), b.to_string())),
                _ => {
                    tracing::debug!(processor = %metadata.name, header = %name, "Ignoring non-scalar header parameter");
                    None
                }
            })
            .collect();

        Ok(Self {
            status,
            body: metadata.params.string(BODY_PARAM)?,
            headers,
            metrics_labels: metadata.metrics_labels,
            name: metadata.name,
        })
    }
}

#[async_trait]
impl Processor for GenerateResponseProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, flow_name: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
        let labels = processor_labels(&self.metrics_labels, flow_name, &self.name, stream);
        metrics::counter!(GENERATED_RESPONSE_METRIC, labels).increment(1);

        Ok(ProcessorIO::pass(stream.stream_type()).with_request_action(Action::EarlyResponse(EarlyResponse {
            status: self.status,
            body: self.body.clone(),
            headers: self.headers.clone(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::flow::ProcessorConfig;
    use crate::processors::ProcessorRegistry;
    use crate::resources::Resources;

    fn build(config: ProcessorConfig) -> Result<Arc<dyn Processor>, ProcessorError> {
        ProcessorRegistry::with_builtins(Arc::new(SystemClock)).create("gen", &config, &Arc::new(Resources::new()))
    }

    #[tokio::test]
    async fn test_generates_early_response_with_headers() {
        let processor = build(
            ProcessorConfig::new("GenerateResponse")
                .with_param("status", 429i64)
                .with_param("body", "Too many requests")
                .with_param("Retry-After", 30i64),
        )
        .unwrap();

        let mut stream = ApiStream::request("GET", "api.example.com/");
        let io = processor.execute("f", &mut stream).await.unwrap();

        assert_eq!(io.name, "");
        let Some(Action::EarlyResponse(response)) = io.request_action else {
            panic!("expected an early response");
        };
        assert_eq!(response.status, 429);
        assert_eq!(response.body, "Too many requests");
        assert_eq!(response.headers.get("Retry-After").map(String::as_str), Some("30"));
    }

    #[tokio::test]
    async fn test_defaults() {
        let processor = build(ProcessorConfig::new("GenerateResponse")).unwrap();
        let mut stream = ApiStream::request("GET", "api.example.com/");
        let io = processor.execute("f", &mut stream).await.unwrap();
        assert!(matches!(io.request_action, Some(Action::EarlyResponse(EarlyResponse { status: 200, .. }))));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let err = build(ProcessorConfig::new("GenerateResponse").with_param("status", 1000i64)).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidConfig { .. }));
    }
}
