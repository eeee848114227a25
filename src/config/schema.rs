//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//!
//! Connection endpoints are written as inline tables naming exactly one kind:
//! ```toml
//! request = [
//!     { from = { stream = "start" }, to = { processor = "limit" } },
//!     { from = { processor = "limit", condition = "above_limit" }, to = { processor = "reject" } },
//!     { from = { processor = "limit", condition = "below_limit" }, to = { stream = "end" } },
//!     { from = { processor = "reject" }, to = { flow = "audit", at = "start" } },
//! ]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::{Anchor, Connection, Direction, Endpoint, FlowError, FlowRepresentation, ProcessorConfig};
use crate::observability::metrics::DEFAULT_CHANNEL_CAPACITY;
use crate::selector::Filter;
use crate::system_flow::{AnchorProcessors, ResourceFlow, SystemFlowRepresentation};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// User flow definitions.
    pub flows: Vec<FlowConfig>,

    /// System-flow fragments spliced into matching flows.
    pub resources: Vec<ResourceConfig>,

    /// Quota counters available to processors.
    pub quotas: Vec<QuotaConfig>,

    pub metrics: MetricsConfig,

    pub logging: LoggingConfig,
}

/// One user flow.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    pub name: String,
    pub filter: Filter,
    pub processors: BTreeMap<String, ProcessorConfig>,
    pub request: Option<Vec<ConnectionConfig>>,
    pub response: Option<Vec<ConnectionConfig>>,
}

impl FlowConfig {
    /// Convert into the in-memory representation, checking endpoint syntax.
    pub fn to_representation(&self) -> Result<FlowRepresentation, FlowError> {
        let mut flow = FlowRepresentation::new(self.name.clone(), self.filter.clone());
        for (key, config) in &self.processors {
            flow.add_processor(key.clone(), config.clone());
        }
        for (direction, connections) in [(Direction::Request, &self.request), (Direction::Response, &self.response)] {
            let converted = connections
                .as_ref()
                .map(|edges| {
                    edges
                        .iter()
                        .map(|edge| edge.to_connection(&self.name))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            flow.set_connections(direction, converted);
        }
        Ok(flow)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ConnectionConfig {
    pub from: EndpointConfig,
    pub to: EndpointConfig,
}

impl ConnectionConfig {
    pub fn to_connection(&self, flow: &str) -> Result<Connection, FlowError> {
        Ok(Connection::new(self.from.to_endpoint(flow)?, self.to.to_endpoint(flow)?))
    }
}

/// Connection endpoint as written in configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub stream: Option<Anchor>,
    pub processor: Option<String>,
    /// Condition label; only meaningful on a processor source.
    pub condition: String,
    pub flow: Option<String>,
    /// Anchor of the referenced flow; defaults to `start`.
    pub at: Option<Anchor>,
}

impl EndpointConfig {
    pub fn to_endpoint(&self, flow: &str) -> Result<Endpoint, FlowError> {
        let invalid = |detail: &str| FlowError::InvalidEndpoint {
            flow: flow.to_string(),
            detail: detail.to_string(),
        };

        match (&self.stream, &self.processor, &self.flow) {
            (Some(anchor), None, None) => Ok(Endpoint::Stream(*anchor)),
            (None, Some(key), None) => Ok(Endpoint::processor_when(key.clone(), self.condition.clone())),
            (None, None, Some(name)) => Ok(Endpoint::flow(name.clone(), self.at.unwrap_or(Anchor::Start))),
            (None, None, None) => Err(invalid("endpoint names none of stream, processor or flow")),
            _ => Err(invalid("endpoint must name exactly one of stream, processor or flow")),
        }
    }
}

/// A resource: processors attached at the Start and End anchors of every
/// flow sharing its filter.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    pub id: String,
    pub filter: Filter,
    pub processors: BTreeMap<String, ProcessorConfig>,
    pub request: AnchorProcessors,
    pub response: AnchorProcessors,
}

impl ResourceConfig {
    pub fn to_system_flow(&self) -> Result<SystemFlowRepresentation, FlowError> {
        let mut fragment = SystemFlowRepresentation::new(self.id.clone(), self.filter.clone());
        fragment.add_system_flow(
            &self.processors,
            &ResourceFlow {
                request: self.request.clone(),
                response: self.response.clone(),
            },
        )?;
        Ok(fragment)
    }
}

/// Fixed-window quota.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuotaConfig {
    pub id: String,
    pub limit: u64,
    pub window_seconds: u64,

    /// Count separately per value of this request header.
    #[serde(default)]
    pub group_by_header: Option<String>,
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Aggregate execution times and forward them to the `metrics` facade.
    pub enabled: bool,

    /// Capacity of each metrics channel.
    pub channel_capacity: usize,

    /// Prometheus scrape address; no exporter when absent.
    pub prometheus_address: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            prometheus_address: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "flow_gateway=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [[quotas]]
        id = "per_tenant"
        limit = 100
        window_seconds = 60
        group_by_header = "x-tenant"

        [[flows]]
        name = "orders"
        filter = { url = "api.example.com/v1/orders/*", methods = ["POST"] }

        [flows.processors.limit]
        processor = "Limiter"
        parameters = { quota_id = "per_tenant" }

        [flows.processors.reject]
        processor = "GenerateResponse"
        parameters = { status = 429, body = "slow down" }

        [[flows.request]]
        from = { stream = "start" }
        to = { processor = "limit" }

        [[flows.request]]
        from = { processor = "limit", condition = "above_limit" }
        to = { processor = "reject" }

        [[flows.request]]
        from = { processor = "limit", condition = "below_limit" }
        to = { stream = "end" }

        [[flows.request]]
        from = { processor = "reject" }
        to = { stream = "end" }

        [[resources]]
        id = "audit"
        filter = { url = "api.example.com/v1/orders/*", methods = ["POST"] }
        request = { start = ["tag"] }

        [resources.processors.tag]
        processor = "Filter"
        parameters = { method = "POST" }

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_parse_example() {
        let config: GatewayConfig = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.flows.len(), 1);
        assert_eq!(config.quotas[0].group_by_header.as_deref(), Some("x-tenant"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.metrics.enabled);

        let flow = config.flows[0].to_representation().unwrap();
        let request = flow.connections(Direction::Request).unwrap();
        assert_eq!(request.len(), 4);
        assert_eq!(request[1].condition(), "above_limit");
        assert!(flow.connections(Direction::Response).is_none());

        let fragment = config.resources[0].to_system_flow().unwrap();
        assert_eq!(fragment.anchors().request.start, vec!["tag"]);
    }

    #[test]
    fn test_endpoint_must_name_one_kind() {
        let both = EndpointConfig {
            stream: Some(Anchor::End),
            processor: Some("p".into()),
            ..Default::default()
        };
        assert!(matches!(both.to_endpoint("f"), Err(FlowError::InvalidEndpoint { .. })));
        assert!(matches!(
            EndpointConfig::default().to_endpoint("f"),
            Err(FlowError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_flow_endpoint_defaults_to_start() {
        let endpoint = EndpointConfig {
            flow: Some("other".into()),
            ..Default::default()
        };
        assert_eq!(endpoint.to_endpoint("f").unwrap(), Endpoint::flow("other", Anchor::Start));
    }

    #[test]
    fn test_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert!(config.flows.is_empty());
        assert_eq!(config.metrics.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.logging.level, "flow_gateway=info");
    }
}
