//! `Filter`: label a stream `hit` or `miss` against URL, method, header,
//! status and sampling criteria.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::observability::metrics::processor_labels;
use crate::processors::error::ProcessorError;
use crate::processors::params::{ParamKind, ParamSpec};
use crate::processors::registry::{ProcessorDefinition, ProcessorMetadata};
use crate::processors::{Processor, ProcessorIO};
use crate::runtime::stream::ApiStream;
use crate::selector::{HeaderMatcher, Matcher, MethodMatcher, UrlMatcher};

const URL_PARAM: &str = "url";
const METHOD_PARAM: &str = "method";
const HEADERS_PARAM: &str = "headers";
const STATUS_CODE_PARAM: &str = "status_code";
const SAMPLE_PERCENTAGE_PARAM: &str = "sample_percentage";

pub const HIT_CONDITION: &str = "hit";
pub const MISS_CONDITION: &str = "miss";

const HIT_COUNT_METRIC: &str = "flow_gateway_filter_processor_hit_count";
const MISS_COUNT_METRIC: &str = "flow_gateway_filter_processor_miss_count";

pub fn definition() -> ProcessorDefinition {
    ProcessorDefinition::new(
        "Filter",
        vec![
            ParamSpec::optional(URL_PARAM, ParamKind::StringList),
            ParamSpec::optional(METHOD_PARAM, ParamKind::StringList),
            ParamSpec::optional(HEADERS_PARAM, ParamKind::Map),
            ParamSpec::optional(STATUS_CODE_PARAM, ParamKind::StringList),
            ParamSpec::optional(SAMPLE_PERCENTAGE_PARAM, ParamKind::Number),
        ],
        |metadata| Ok(Arc::new(FilterProcessor::new(metadata)?) as Arc<dyn Processor>),
    )
    .with_conditions(&[HIT_CONDITION, MISS_CONDITION])
}

/// All configured criteria must hold for a `hit`. A list criterion holds when
/// any of its entries matches.
#[derive(Debug)]
pub struct FilterProcessor {
    name: String,
    urls: Vec<UrlMatcher>,
    methods: Option<MethodMatcher>,
    headers: Vec<HeaderMatcher>,
    status_codes: Vec<u16>,
    sample_percentage: Option<f64>,
    metrics_labels: Vec<String>,
}

impl FilterProcessor {
    pub fn new(metadata: ProcessorMetadata) -> Result<Self, ProcessorError> {
        let params = &metadata.params;
        let invalid = |reason: String| ProcessorError::InvalidConfig {
            processor: metadata.name.clone(),
            reason,
        };

        let methods = params.string_list(METHOD_PARAM);
        let status_codes = params
            .string_list(STATUS_CODE_PARAM)
            .iter()
            .map(|code| {
                code.trim()
                    .parse::<u16>()
                    .map_err(|_| invalid(format!("status code {} is not a number", code)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sample_percentage = if params.contains(SAMPLE_PERCENTAGE_PARAM) {
            let pct = params.number(SAMPLE_PERCENTAGE_PARAM)?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(invalid(format!("sample_percentage {} must be within 0..=100", pct)));
            }
            Some(pct)
        } else {
            None
        };

        let filter = Self {
            name: metadata.name.clone(),
            urls: params.string_list(URL_PARAM).iter().map(|u| UrlMatcher::new(u)).collect(),
            methods: (!methods.is_empty()).then(|| MethodMatcher::new(&methods)),
            headers: params
                .map(HEADERS_PARAM)
                .iter()
                .map(|(name, value)| HeaderMatcher::new(name, value))
                .collect(),
            status_codes,
            sample_percentage,
            metrics_labels: metadata.metrics_labels.clone(),
        };

        if !filter.has_criteria() {
            return Err(invalid("no filter criteria defined".into()));
        }
        Ok(filter)
    }

    fn has_criteria(&self) -> bool {
        !self.urls.is_empty()
            || self.methods.is_some()
            || !self.headers.is_empty()
            || !self.status_codes.is_empty()
            || self.sample_percentage.is_some()
    }

    fn is_hit(&self, stream: &ApiStream) -> bool {
        if !self.urls.is_empty() && !self.urls.iter().any(|m| m.matches(stream)) {
            return false;
        }
        if let Some(methods) = &self.methods {
            if !methods.matches(stream) {
                return false;
            }
        }
        if !self.headers.iter().all(|m| m.matches(stream)) {
            return false;
        }
        // Status criteria only apply once there is a response.
        if !self.status_codes.is_empty() && stream.status != 0 && !self.status_codes.contains(&stream.status) {
            return false;
        }
        match self.sample_percentage {
            Some(pct) => rand::thread_rng().gen_range(0.0..100.0) < pct,
            None => true,
        }
    }
}

#[async_trait]
impl Processor for FilterProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, flow_name: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
        let (condition, metric) = if self.is_hit(stream) {
            (HIT_CONDITION, HIT_COUNT_METRIC)
        } else {
            (MISS_CONDITION, MISS_COUNT_METRIC)
        };
        tracing::debug!(processor = %self.name, condition, "Filter evaluated");

        let labels = processor_labels(&self.metrics_labels, flow_name, &self.name, stream);
        metrics::counter!(metric, labels).increment(1);

        Ok(ProcessorIO::new(stream.stream_type(), condition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::clock::SystemClock;
    use crate::flow::ProcessorConfig;
    use crate::processors::ProcessorRegistry;
    use crate::resources::Resources;

    fn build(config: ProcessorConfig) -> Result<Arc<dyn Processor>, ProcessorError> {
        ProcessorRegistry::with_builtins(Arc::new(SystemClock)).create("filter", &config, &Arc::new(Resources::new()))
    }

    async fn condition(processor: &Arc<dyn Processor>, mut stream: ApiStream) -> String {
        processor.execute("f", &mut stream).await.unwrap().name
    }

    #[tokio::test]
    async fn test_url_and_method() {
        let filter = build(
            ProcessorConfig::new("Filter")
                .with_param("url", vec!["api.example.com/v1/*".to_string(), "other.com/x".to_string()])
                .with_param("method", "post"),
        )
        .unwrap();

        assert_eq!(condition(&filter, ApiStream::request("POST", "api.example.com/v1/orders")).await, HIT_CONDITION);
        assert_eq!(condition(&filter, ApiStream::request("POST", "other.com/x")).await, HIT_CONDITION);
        assert_eq!(condition(&filter, ApiStream::request("GET", "api.example.com/v1/orders")).await, MISS_CONDITION);
        assert_eq!(condition(&filter, ApiStream::request("POST", "api.example.com/v2")).await, MISS_CONDITION);
    }

    #[tokio::test]
    async fn test_headers_must_all_match() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Tier".to_string(), "gold".to_string());
        let filter = build(ProcessorConfig::new("Filter").with_param("headers", headers)).unwrap();

        let gold = ApiStream::request("GET", "a.com/").with_header("x-tier", "gold");
        let silver = ApiStream::request("GET", "a.com/").with_header("x-tier", "silver");
        assert_eq!(condition(&filter, gold).await, HIT_CONDITION);
        assert_eq!(condition(&filter, silver).await, MISS_CONDITION);
    }

    #[tokio::test]
    async fn test_status_code_on_response() {
        let filter = build(ProcessorConfig::new("Filter").with_param("status_code", vec!["429".to_string(), "503".to_string()]))
            .unwrap();
        let request = ApiStream::request("GET", "a.com/");

        assert_eq!(condition(&filter, ApiStream::response_to(&request, 503)).await, HIT_CONDITION);
        assert_eq!(condition(&filter, ApiStream::response_to(&request, 200)).await, MISS_CONDITION);
    }

    #[tokio::test]
    async fn test_sample_percentage_bounds() {
        let never = build(ProcessorConfig::new("Filter").with_param("sample_percentage", 0i64)).unwrap();
        let always = build(ProcessorConfig::new("Filter").with_param("sample_percentage", 100i64)).unwrap();
        for _ in 0..20 {
            assert_eq!(condition(&never, ApiStream::request("GET", "a.com/")).await, MISS_CONDITION);
            assert_eq!(condition(&always, ApiStream::request("GET", "a.com/")).await, HIT_CONDITION);
        }
    }

    #[test]
    fn test_requires_some_criteria() {
        assert!(matches!(
            build(ProcessorConfig::new("Filter")),
            Err(ProcessorError::InvalidConfig { .. })
        ));
        assert!(matches!(
            build(ProcessorConfig::new("Filter").with_param("sample_percentage", 150i64)),
            Err(ProcessorError::InvalidConfig { .. })
        ));
    }
}
