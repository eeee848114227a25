//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Aggregate flow and processor execution times off the hot path
//! - Notify observers after every aggregate update
//! - Expose pull accessors for embedding transports
//! - Forward updates into the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `flow_gateway_flow_invocations_total` (counter): walks per flow
//! - `flow_gateway_flow_failures_total` (counter): walks with a failed processor
//! - `flow_gateway_flow_execution_avg_ms` (gauge): running average per flow
//! - `flow_gateway_processor_invocations_total` (counter): calls per processor
//! - `flow_gateway_processor_failures_total` (counter): errors per processor
//! - `flow_gateway_processor_execution_avg_ms` (gauge): running average per processor
//! - `flow_gateway_active_flows` (gauge): flows in the live snapshot
//!
//! # Design Decisions
//! - Producers `try_send` into bounded channels; a full channel drops the event
//! - One drain task per channel owns every aggregate write
//! - Labels are flow name and processor key plus whatever a processor opts into
//! - Events carry their own stream id and label set; aggregates key on names only

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::runtime::stream::ApiStream;
use crate::selector::matcher::host_and_path;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowStats {
    pub count: u64,
    pub failures: u64,
    pub total: Duration,
    pub average_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorStats {
    pub count: u64,
    pub failures: u64,
    pub total: Duration,
    pub average_ms: f64,
}

/// Aggregate change delivered to observers, with the event that caused it.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsUpdate {
    Flow {
        event: FlowEvent,
        stats: FlowStats,
    },
    Processor {
        event: ProcessorEvent,
        stats: ProcessorStats,
    },
    ActiveFlows(Vec<String>),
}

pub type MetricsObserver = Arc<dyn Fn(&MetricsUpdate) + Send + Sync>;

/// One walk of a flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowEvent {
    pub flow: String,
    pub stream_id: String,
    pub elapsed: Duration,
    pub success: bool,
    pub labels: Vec<Label>,
}

impl FlowEvent {
    /// Event labelled with `flow_name` and the stream direction.
    pub fn new(flow: &str, stream: &ApiStream, elapsed: Duration, success: bool) -> Self {
        Self {
            flow: flow.to_string(),
            stream_id: stream.id.clone(),
            elapsed,
            success,
            labels: vec![
                Label::new("flow_name", flow.to_string()),
                Label::new("direction", stream.direction.to_string()),
            ],
        }
    }
}

/// One processor execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorEvent {
    pub flow: String,
    pub processor: String,
    pub stream_id: String,
    pub elapsed: Duration,
    pub success: bool,
    pub labels: Vec<Label>,
}

impl ProcessorEvent {
    /// Event labelled with `flow_name`, `processor_key` and the stream direction.
    pub fn new(flow: &str, processor: &str, stream: &ApiStream, elapsed: Duration, success: bool) -> Self {
        Self {
            flow: flow.to_string(),
            processor: processor.to_string(),
            stream_id: stream.id.clone(),
            elapsed,
            success,
            labels: processor_labels(&["direction".to_string()], flow, processor, stream),
        }
    }
}

#[derive(Default)]
struct Shared {
    flows: DashMap<String, FlowStats>,
    processors: DashMap<(String, String), ProcessorStats>,
    observers: RwLock<Vec<MetricsObserver>>,
    active_flows: RwLock<Vec<String>>,
    requests_through_flows: AtomicU64,
    flow_invocations: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn notify(&self, update: &MetricsUpdate) {
        let observers = self.observers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        for observer in observers.iter() {
            observer(update);
        }
    }
}

type Receivers = (mpsc::Receiver<FlowEvent>, mpsc::Receiver<ProcessorEvent>);

/// Asynchronous execution-time aggregator.
pub struct MetricsCollector {
    flow_tx: mpsc::Sender<FlowEvent>,
    processor_tx: mpsc::Sender<ProcessorEvent>,
    receivers: Mutex<Option<Receivers>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("flows", &self.shared.flows.len())
            .field("processors", &self.shared.processors.len())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

impl MetricsCollector {
    /// Collector with bounded channels of `capacity` events each. Nothing is
    /// aggregated until `spawn` starts the drain tasks.
    pub fn new(capacity: usize) -> Self {
        let (flow_tx, flow_rx) = mpsc::channel(capacity.max(1));
        let (processor_tx, processor_rx) = mpsc::channel(capacity.max(1));
        Self {
            flow_tx,
            processor_tx,
            receivers: Mutex::new(Some((flow_rx, processor_rx))),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Start both drain tasks. Returns no handles when already started.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let Some((mut flow_rx, mut processor_rx)) = self
            .receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        else {
            return Vec::new();
        };

        let shared = self.shared.clone();
        let flows = tokio::spawn(async move {
            while let Some(event) = flow_rx.recv().await {
                let stats = {
                    let mut entry = shared.flows.entry(event.flow.clone()).or_default();
                    entry.count += 1;
                    if !event.success {
                        entry.failures += 1;
                    }
                    entry.total += event.elapsed;
                    entry.average_ms = entry.total.as_secs_f64() * 1000.0 / entry.count as f64;
                    entry.clone()
                };
                shared.notify(&MetricsUpdate::Flow { event, stats });
            }
            tracing::debug!("Flow metrics channel closed");
        });

        let shared = self.shared.clone();
        let processors = tokio::spawn(async move {
            while let Some(event) = processor_rx.recv().await {
                let stats = {
                    let mut entry = shared
                        .processors
                        .entry((event.flow.clone(), event.processor.clone()))
                        .or_default();
                    entry.count += 1;
                    if !event.success {
                        entry.failures += 1;
                    }
                    entry.total += event.elapsed;
                    entry.average_ms = entry.total.as_secs_f64() * 1000.0 / entry.count as f64;
                    entry.clone()
                };
                shared.notify(&MetricsUpdate::Processor { event, stats });
            }
            tracing::debug!("Processor metrics channel closed");
        });

        vec![flows, processors]
    }

    pub fn record_flow(&self, event: FlowEvent) {
        if let Err(e) = self.flow_tx.try_send(event) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(error = %e, "Dropping flow metrics event");
        }
    }

    pub fn record_processor(&self, event: ProcessorEvent) {
        if let Err(e) = self.processor_tx.try_send(event) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(error = %e, "Dropping processor metrics event");
        }
    }

    pub fn register_observer(&self, observer: MetricsObserver) {
        self.shared
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// Publish the flows of a newly applied snapshot.
    pub fn set_active_flows(&self, flows: Vec<String>) {
        *self
            .shared
            .active_flows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = flows.clone();
        self.shared.notify(&MetricsUpdate::ActiveFlows(flows));
    }

    pub fn active_flows(&self) -> Vec<String> {
        self.shared
            .active_flows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Mean flow execution time across every flow, in milliseconds.
    pub fn average_flow_execution_ms(&self) -> f64 {
        let (count, total) = self
            .shared
            .flows
            .iter()
            .fold((0u64, Duration::ZERO), |(count, total), entry| {
                (count + entry.count, total + entry.total)
            });
        if count == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1000.0 / count as f64
        }
    }

    pub fn flow_stats(&self, flow: &str) -> Option<FlowStats> {
        self.shared.flows.get(flow).map(|entry| entry.clone())
    }

    /// Per-processor aggregates keyed by `(flow, processor key)`.
    pub fn processor_stats(&self) -> BTreeMap<(String, String), ProcessorStats> {
        self.shared
            .processors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn increment_requests(&self) {
        self.shared.requests_through_flows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_through_flows(&self) -> u64 {
        self.shared.requests_through_flows.load(Ordering::Relaxed)
    }

    pub fn increment_flow_invocations(&self) {
        self.shared.flow_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flow_invocations(&self) -> u64 {
        self.shared.flow_invocations.load(Ordering::Relaxed)
    }

    /// Events lost to full channels.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Observer forwarding aggregate updates into the `metrics` facade.
pub fn metrics_facade_observer() -> MetricsObserver {
    Arc::new(|update: &MetricsUpdate| match update {
        MetricsUpdate::Flow { event, stats } => {
            let labels = vec![Label::new("flow_name", event.flow.clone())];
            metrics::counter!("flow_gateway_flow_invocations_total", labels.clone()).absolute(stats.count);
            metrics::counter!("flow_gateway_flow_failures_total", labels.clone()).absolute(stats.failures);
            metrics::gauge!("flow_gateway_flow_execution_avg_ms", labels).set(stats.average_ms);
        }
        MetricsUpdate::Processor { event, stats } => {
            let labels = vec![
                Label::new("flow_name", event.flow.clone()),
                Label::new("processor_key", event.processor.clone()),
            ];
            metrics::counter!("flow_gateway_processor_invocations_total", labels.clone()).absolute(stats.count);
            metrics::counter!("flow_gateway_processor_failures_total", labels.clone()).absolute(stats.failures);
            metrics::gauge!("flow_gateway_processor_execution_avg_ms", labels).set(stats.average_ms);
        }
        MetricsUpdate::ActiveFlows(flows) => {
            metrics::gauge!("flow_gateway_active_flows").set(flows.len() as f64);
        }
    })
}

/// Install the Prometheus recorder and its scrape listener.
pub fn init_exporter(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Labels for a processor-emitted metric.
///
/// `flow_name` and `processor_key` are always present. Each requested label is
/// resolved from the stream: `http_method`, `status_code`, `host`, `path` and
/// `direction` are built in, any other name is read as a header.
pub fn processor_labels(requested: &[String], flow: &str, processor: &str, stream: &ApiStream) -> Vec<Label> {
    let mut labels = vec![
        Label::new("flow_name", flow.to_string()),
        Label::new("processor_key", processor.to_string()),
    ];
    for name in requested {
        let value = match name.as_str() {
            "http_method" => Some(stream.method.clone()),
            "status_code" => Some(stream.status.to_string()),
            "host" => host_and_path(&stream.url).map(|(host, _)| host),
            "path" => host_and_path(&stream.url).map(|(_, path)| path),
            "direction" => Some(stream.direction.to_string()),
            header => stream.header(header).map(str::to_string),
        };
        if let Some(value) = value {
            labels.push(Label::new(name.clone(), value));
        }
    }
    labels
}
