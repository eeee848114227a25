//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use flow_gateway::clock::{Clock, SystemClock};
use flow_gateway::config::parse_config;
use flow_gateway::observability::MetricsCollector;
use flow_gateway::processors::{Processor, ProcessorDefinition, ProcessorError, ProcessorIO, ProcessorRegistry};
use flow_gateway::runtime::{ApiStream, Runtime};

/// Appends its key to the `x-trail` header and records itself in the flow
/// and transactional scopes. Emits the condition found in `x-condition`.
#[derive(Debug)]
pub struct Recorder {
    name: String,
}

#[async_trait]
impl Processor for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _flow: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
        let trail = match stream.header("x-trail") {
            Some(previous) => format!("{},{}", previous, self.name),
            None => self.name.clone(),
        };
        stream.set_header("x-trail", trail);
        stream.context().flow.set("seen", self.name.clone());
        stream.context().transactional.set(format!("visited::{}", self.name), true);

        Ok(ProcessorIO::new(
            stream.stream_type(),
            stream.header("x-condition").unwrap_or_default().to_string(),
        ))
    }
}

pub fn registry(clock: Arc<dyn Clock>) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::with_builtins(clock);
    registry.register(ProcessorDefinition::new("Recorder", Vec::new(), |metadata| {
        Ok(Arc::new(Recorder { name: metadata.name }) as Arc<dyn Processor>)
    }));
    registry
}

/// Runtime over `config` with the system clock and an unspawned collector.
pub fn runtime(config: &str) -> Runtime {
    runtime_with(config, Arc::new(SystemClock), Arc::new(MetricsCollector::default()))
}

pub fn runtime_with(config: &str, clock: Arc<dyn Clock>, metrics: Arc<MetricsCollector>) -> Runtime {
    let runtime = Runtime::new(registry(clock), metrics);
    runtime.load(&parse_config(config).unwrap()).unwrap();
    runtime
}

pub fn trail(stream: &ApiStream) -> &str {
    stream.header("x-trail").unwrap_or_default()
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(check(), "condition not reached in time");
}
