//! Graph execution.
//!
//! # Responsibilities
//! - Hold the live `FlowSnapshot` and swap it atomically on reload
//! - Walk the selected flows for each stream and collect their actions
//! - Resume the short-circuiting flow on the response side
//! - Feed execution times to the metrics side-channel
//!
//! # Design Decisions
//! - A transaction loads the snapshot once and finishes on it
//! - Processor errors become the `failure` condition; they never abort a walk
//! - After a failure only an explicit `failure` edge is followed

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::GatewayConfig;
use crate::context::{ContextManager, TransactionalContext};
use crate::flow::{Direction, FlowError};
use crate::observability::metrics::{FlowEvent, MetricsCollector, ProcessorEvent};
use crate::processors::{ProcessorRegistry, ProcessorRequirement, FAILURE_CONDITION};
use crate::resources::{FixedWindowQuota, Resources};
use crate::runtime::actions::StreamActions;
use crate::runtime::graph::{BuildError, Edge, FlowGraph, FlowSnapshot, Node, Target};
use crate::runtime::stream::ApiStream;
use crate::selector::SelectorResult;

/// Where a user flow short-circuited during the request walk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShortCircuit {
    flow: String,
    node: String,
}

/// How a walk enters a flow's direction.
#[derive(Debug, Clone, Copy)]
enum WalkStart<'a> {
    Root,
    /// Continue after the processor that short-circuited the request.
    After(&'a str),
}

/// Per-direction walk state shared by every flow of one transaction.
struct Walk<'a> {
    snapshot: &'a FlowSnapshot,
    direction: Direction,
    transactional: &'a TransactionalContext,
}

/// The flow execution engine.
#[derive(Debug)]
pub struct Runtime {
    snapshot: ArcSwap<FlowSnapshot>,
    registry: ProcessorRegistry,
    contexts: Arc<ContextManager>,
    metrics: Arc<MetricsCollector>,
}

impl Runtime {
    /// Engine with an empty snapshot. Call `load` or `apply` before serving.
    pub fn new(registry: ProcessorRegistry, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(FlowSnapshot::empty()),
            registry,
            contexts: Arc::new(ContextManager::new()),
            metrics,
        }
    }

    /// Build a snapshot from `config` without applying it.
    pub fn build(&self, config: &GatewayConfig) -> Result<FlowSnapshot, BuildError> {
        let mut resources = Resources::new();
        for quota in &config.quotas {
            resources.add_quota(Arc::new(FixedWindowQuota::new(
                quota.id.clone(),
                quota.limit,
                Duration::from_secs(quota.window_seconds),
                quota.group_by_header.clone(),
                self.registry.clock(),
            )?))?;
        }

        let user_flows = config
            .flows
            .iter()
            .map(|flow| flow.to_representation())
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = HashSet::new();
        let mut fragments = Vec::with_capacity(config.resources.len());
        for resource in &config.resources {
            if !ids.insert(resource.id.as_str()) {
                return Err(FlowError::DuplicateResource(resource.id.clone()).into());
            }
            fragments.push(resource.to_system_flow()?);
        }

        FlowSnapshot::build(user_flows, fragments, Arc::new(resources), &self.registry)
    }

    /// Build and apply `config`. On error the current snapshot stays live.
    pub fn load(&self, config: &GatewayConfig) -> Result<(), BuildError> {
        let snapshot = self.build(config)?;
        self.apply(snapshot);
        Ok(())
    }

    /// Replace the live snapshot. In-flight transactions keep the old one.
    pub fn apply(&self, snapshot: FlowSnapshot) {
        let flows = snapshot.flow_names();
        tracing::info!(flows = flows.len(), "Flow snapshot applied");
        self.snapshot.store(Arc::new(snapshot));
        self.metrics.set_active_flows(flows);
    }

    pub fn snapshot(&self) -> Arc<FlowSnapshot> {
        self.snapshot.load_full()
    }

    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Merged processor requirements of every live flow.
    pub fn requirements(&self) -> BTreeMap<String, ProcessorRequirement> {
        self.snapshot.load().requirements()
    }

    /// Run every flow selected for `stream` and return the collected actions.
    ///
    /// A request that short-circuits also runs the response direction against
    /// the generated response; its actions land in `response`.
    pub async fn execute_flow(&self, stream: &mut ApiStream) -> StreamActions {
        let snapshot = self.snapshot.load_full();
        let mut actions = StreamActions::new();

        let (selected, found) = snapshot.selector().get_flow(stream);
        if !found {
            tracing::debug!(url = %stream.url, "No flow found for stream");
            return actions;
        }

        let transactional = TransactionalContext::new();

        match stream.direction {
            Direction::Request => {
                self.metrics.increment_requests();
                let walk = Walk {
                    snapshot: &snapshot,
                    direction: Direction::Request,
                    transactional: &transactional,
                };
                let short_circuit = self.execute_request(&walk, &selected, stream, &mut actions).await;

                if let Some(short_circuit) = short_circuit {
                    let Some(early) = actions.early_response().cloned() else {
                        return actions;
                    };
                    let mut response = ApiStream::response_to(stream, early.status).with_body(early.body);
                    for (name, value) in &early.headers {
                        response.set_header(name, value.clone());
                    }

                    let walk = Walk {
                        direction: Direction::Response,
                        ..walk
                    };
                    self.execute_response(&walk, &selected, &mut response, &mut actions, Some(&short_circuit))
                        .await;
                }
            }
            Direction::Response => {
                let walk = Walk {
                    snapshot: &snapshot,
                    direction: Direction::Response,
                    transactional: &transactional,
                };
                self.execute_response(&walk, &selected, stream, &mut actions, None).await;
            }
        }

        actions
    }

    async fn execute_request(
        &self,
        walk: &Walk<'_>,
        selected: &SelectorResult,
        stream: &mut ApiStream,
        actions: &mut StreamActions,
    ) -> Option<ShortCircuit> {
        for name in &selected.system_start {
            tracing::debug!(flow = %name, "Executing system start request flow");
            self.walk_flow(walk, name, WalkStart::Root, stream, actions).await;
        }

        let mut short_circuit = None;
        for name in &selected.user {
            self.metrics.increment_flow_invocations();
            tracing::debug!(flow = %name, "Executing request flow");
            if let Some(node) = self.walk_flow(walk, name, WalkStart::Root, stream, actions).await {
                tracing::debug!(flow = %name, processor = %node, "Short circuit found");
                short_circuit = Some(ShortCircuit {
                    flow: name.clone(),
                    node,
                });
                break;
            }
        }

        for name in &selected.system_end {
            tracing::debug!(flow = %name, "Executing system end request flow");
            self.walk_flow(walk, name, WalkStart::Root, stream, actions).await;
        }

        short_circuit
    }

    async fn execute_response(
        &self,
        walk: &Walk<'_>,
        selected: &SelectorResult,
        stream: &mut ApiStream,
        actions: &mut StreamActions,
        short_circuit: Option<&ShortCircuit>,
    ) {
        for name in selected.system_start.iter().rev() {
            tracing::debug!(flow = %name, "Executing system start response flow");
            self.walk_flow(walk, name, WalkStart::Root, stream, actions).await;
        }

        for name in selected.user.iter().rev() {
            tracing::debug!(flow = %name, "Executing response flow");
            let start = match short_circuit {
                Some(sc) if &sc.flow == name => WalkStart::After(&sc.node),
                _ => WalkStart::Root,
            };
            self.walk_flow(walk, name, start, stream, actions).await;
        }

        for name in selected.system_end.iter().rev() {
            tracing::debug!(flow = %name, "Executing system end response flow");
            self.walk_flow(walk, name, WalkStart::Root, stream, actions).await;
        }
    }

    /// Walk one flow. Returns the key of the processor that short-circuited, if any.
    async fn walk_flow(
        &self,
        walk: &Walk<'_>,
        name: &str,
        start: WalkStart<'_>,
        stream: &mut ApiStream,
        actions: &mut StreamActions,
    ) -> Option<String> {
        let flow = walk.snapshot.flow(name)?.clone();
        let graph = flow.direction(walk.direction)?;

        let entry = match start {
            WalkStart::Root => graph.root().cloned(),
            WalkStart::After(key) => graph
                .node_id(key)
                .and_then(|id| graph.node(id).edges.first().cloned()),
        };
        let Some(entry) = entry else {
            tracing::debug!(flow = %name, direction = %walk.direction, "Nothing to walk");
            return None;
        };

        let started = Instant::now();
        let mut failed = false;
        let outcome = self.traverse(walk, flow.clone(), entry, stream, actions, &mut failed).await;
        self.metrics
            .record_flow(FlowEvent::new(name, stream, started.elapsed(), !failed));
        outcome
    }

    async fn traverse(
        &self,
        walk: &Walk<'_>,
        mut current: Arc<FlowGraph>,
        mut edge: Edge,
        stream: &mut ApiStream,
        actions: &mut StreamActions,
        failed_any: &mut bool,
    ) -> Option<String> {
        let mut visited = HashSet::from([current.name().to_string()]);
        stream.set_context(self.contexts.execution_context(current.name(), walk.transactional));

        loop {
            let id = match &edge.target {
                Target::End => return None,
                Target::Node(id) => *id,
                Target::Flow(name) => {
                    let next = walk.snapshot.flow(name)?.clone();
                    if !visited.insert(name.clone()) {
                        tracing::warn!(flow = %current.name(), target = %name, "Flow already visited in this walk, stopping");
                        return None;
                    }
                    let entry = next.direction(walk.direction)?.entry_from(current.name())?.clone();
                    tracing::debug!(from = %current.name(), to = %next.name(), "Jumping to flow");

                    stream.set_context(self.contexts.execution_context(next.name(), walk.transactional));
                    current = next;
                    edge = entry;
                    continue;
                }
            };

            if stream.is_cancelled() {
                tracing::debug!(flow = %current.name(), "Stream cancelled, stopping walk");
                return None;
            }

            let graph = current.direction(walk.direction)?;
            let node = graph.node(id);

            let started = Instant::now();
            let result = node.processor.execute(current.name(), stream).await;
            let elapsed = started.elapsed();

            let (condition, failed) = match result {
                Ok(io) => {
                    self.metrics
                        .record_processor(ProcessorEvent::new(current.name(), &node.key, stream, elapsed, true));
                    let short_circuit = io.is_short_circuit();
                    if let Some(action) = io.request_action {
                        actions.push(Direction::Request, action);
                    }
                    if let Some(action) = io.response_action {
                        actions.push(Direction::Response, action);
                    }
                    if short_circuit {
                        return Some(node.key.clone());
                    }
                    (io.name, false)
                }
                Err(e) => {
                    self.metrics
                        .record_processor(ProcessorEvent::new(current.name(), &node.key, stream, elapsed, false));
                    *failed_any = true;
                    tracing::warn!(flow = %current.name(), processor = %node.key, error = %e, "Processor failed");
                    (FAILURE_CONDITION.to_string(), true)
                }
            };

            tracing::debug!(flow = %current.name(), processor = %node.key, condition = %condition, "Processor executed");
            match select_edge(walk, node, &condition, failed) {
                Some(next) => edge = next.clone(),
                None => {
                    tracing::debug!(flow = %current.name(), processor = %node.key, condition = %condition, "No edge for condition, walk ends");
                    return None;
                }
            }
        }
    }
}

/// Exact condition match, else the default edge unless the processor failed.
fn select_edge<'g>(walk: &Walk<'_>, node: &'g Node, condition: &str, failed: bool) -> Option<&'g Edge> {
    let available = |edge: &&Edge| match &edge.target {
        Target::Node(_) | Target::End => true,
        Target::Flow(name) => walk
            .snapshot
            .flow(name)
            .map(|flow| flow.direction(walk.direction).is_some())
            .unwrap_or(false),
    };

    let exact = node
        .edges
        .iter()
        .filter(available)
        .find(|edge| edge.condition == condition);
    if exact.is_some() || failed {
        return exact;
    }
    node.edges
        .iter()
        .filter(available)
        .find(|edge| edge.condition.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::clock::SystemClock;
    use crate::config::parse_config;
    use crate::processors::{Processor, ProcessorDefinition, ProcessorError, ProcessorIO};
    use crate::runtime::actions::{Action, Modification};

    /// Emits the condition found in `x-condition` and appends its key to a trail
    /// in the transactional scope. `x-modify-<key>` adds a request modification,
    /// `x-fail-<key>` makes it fail.
    #[derive(Debug)]
    struct Scripted {
        name: String,
    }

    #[async_trait]
    impl Processor for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, _flow: &str, stream: &mut ApiStream) -> Result<ProcessorIO, ProcessorError> {
            let trail = stream.context().transactional.get("trail").ok();
            let mut trail: Vec<String> = trail
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            trail.push(self.name.clone());
            stream.context().transactional.set("trail", serde_json::json!(trail));
            stream.context().flow.set("last", self.name.clone());
            stream.set_header("x-trail", trail.join(","));

            if stream.header(&format!("x-fail-{}", self.name)).is_some() {
                return Err(ProcessorError::Execution {
                    processor: self.name.clone(),
                    reason: "asked to fail".into(),
                });
            }
            let io = ProcessorIO::new(
                stream.stream_type(),
                stream.header("x-condition").unwrap_or_default().to_string(),
            );
            if stream.header(&format!("x-modify-{}", self.name)).is_some() {
                return Ok(io.with_request_action(Action::Modify(modified_by(&self.name))));
            }
            Ok(io)
        }
    }

    fn modified_by(name: &str) -> Modification {
        Modification {
            set_headers: [(format!("x-modified-by-{name}"), "1".to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    fn runtime(config: &str) -> Runtime {
        let mut registry = ProcessorRegistry::with_builtins(Arc::new(SystemClock));
        registry.register(ProcessorDefinition::new("Scripted", Vec::new(), |metadata| {
            Ok(Arc::new(Scripted { name: metadata.name }) as Arc<dyn Processor>)
        }));
        let runtime = Runtime::new(registry, Arc::new(MetricsCollector::default()));
        runtime.load(&parse_config(config).unwrap()).unwrap();
        runtime
    }

    const BRANCHING: &str = r#"
        [[flows]]
        name = "branching"
        filter = { url = "api.com/*" }
        processors = { P1 = { processor = "Scripted" }, P2 = { processor = "Scripted" }, F = { processor = "Scripted" } }
        request = [
            { from = { stream = "start" }, to = { processor = "P1" } },
            { from = { processor = "P1", condition = "hit" }, to = { stream = "end" } },
            { from = { processor = "P1", condition = "miss" }, to = { processor = "P2" } },
            { from = { processor = "P1", condition = "failure" }, to = { processor = "F" } },
            { from = { processor = "P2" }, to = { stream = "end" } },
            { from = { processor = "F" }, to = { stream = "end" } },
        ]
    "#;

    async fn trail(runtime: &Runtime, mut stream: ApiStream) -> String {
        runtime.execute_flow(&mut stream).await;
        stream.header("x-trail").unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_condition_selects_edge() {
        let runtime = runtime(BRANCHING);
        let hit = ApiStream::request("GET", "api.com/x").with_header("x-condition", "hit");
        let miss = ApiStream::request("GET", "api.com/x").with_header("x-condition", "miss");

        assert_eq!(trail(&runtime, hit).await, "P1");
        assert_eq!(trail(&runtime, miss).await, "P1,P2");
    }

    #[tokio::test]
    async fn test_unknown_condition_without_default_terminates() {
        let runtime = runtime(BRANCHING);
        let other = ApiStream::request("GET", "api.com/x").with_header("x-condition", "other");
        assert_eq!(trail(&runtime, other).await, "P1");
    }

    #[tokio::test]
    async fn test_failure_edge_followed() {
        let runtime = runtime(BRANCHING);
        let failing = ApiStream::request("GET", "api.com/x").with_header("x-fail-P1", "1");
        assert_eq!(trail(&runtime, failing).await, "P1,F");
    }

    #[tokio::test]
    async fn test_failure_does_not_take_default_edge() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "f"
            filter = { url = "api.com/*" }
            processors = { P1 = { processor = "Scripted" }, P2 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "P1" } },
                { from = { processor = "P1" }, to = { processor = "P2" } },
                { from = { processor = "P2" }, to = { stream = "end" } },
            ]
            "#,
        );
        let failing = ApiStream::request("GET", "api.com/x").with_header("x-fail-P1", "1");
        assert_eq!(trail(&runtime, failing).await, "P1");

        let passing = ApiStream::request("GET", "api.com/x");
        assert_eq!(trail(&runtime, passing).await, "P1,P2");
    }

    #[tokio::test]
    async fn test_actions_kept_when_later_processor_fails() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "f"
            filter = { url = "api.com/*" }
            processors = { P1 = { processor = "Scripted" }, P2 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "P1" } },
                { from = { processor = "P1" }, to = { processor = "P2" } },
                { from = { processor = "P2" }, to = { stream = "end" } },
            ]
            "#,
        );
        let mut stream = ApiStream::request("GET", "api.com/x")
            .with_header("x-modify-P1", "1")
            .with_header("x-fail-P2", "1");
        let actions = runtime.execute_flow(&mut stream).await;

        assert_eq!(stream.header("x-trail"), Some("P1,P2"));
        assert_eq!(actions.request, vec![Action::Modify(modified_by("P1"))]);
        assert!(actions.response.is_empty());
    }

    #[tokio::test]
    async fn test_flow_jump_keeps_transactional_context() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "a"
            filter = { url = "api.com/a" }
            processors = { A1 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "A1" } },
                { from = { processor = "A1" }, to = { flow = "b" } },
            ]

            [[flows]]
            name = "b"
            filter = { url = "internal.local/b" }
            processors = { B1 = { processor = "Scripted" }, B2 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "B2" } },
                { from = { flow = "a", at = "end" }, to = { processor = "B1" } },
                { from = { processor = "B1" }, to = { stream = "end" } },
                { from = { processor = "B2" }, to = { stream = "end" } },
            ]
            "#,
        );

        assert_eq!(trail(&runtime, ApiStream::request("GET", "api.com/a")).await, "A1,B1");
        assert_eq!(trail(&runtime, ApiStream::request("GET", "internal.local/b")).await, "B2");
    }

    #[tokio::test]
    async fn test_flow_reentry_stops_walk() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "a"
            filter = { url = "api.com/a" }
            processors = { A1 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "A1" } },
                { from = { processor = "A1" }, to = { flow = "b" } },
            ]

            [[flows]]
            name = "b"
            filter = { url = "internal.local/b" }
            processors = { B1 = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "B1" } },
                { from = { processor = "B1" }, to = { flow = "a" } },
            ]
            "#,
        );
        assert_eq!(trail(&runtime, ApiStream::request("GET", "api.com/a")).await, "A1,B1");
    }

    #[tokio::test]
    async fn test_short_circuit_runs_response_from_generating_node() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "guarded"
            filter = { url = "api.com/*" }
            processors = { check = { processor = "Scripted" }, reject = { processor = "GenerateResponse", parameters = { status = 403 } }, tag = { processor = "Scripted" }, late = { processor = "Scripted" } }
            request = [
                { from = { stream = "start" }, to = { processor = "check" } },
                { from = { processor = "check", condition = "deny" }, to = { processor = "reject" } },
                { from = { processor = "check" }, to = { stream = "end" } },
            ]
            response = [
                { from = { stream = "start" }, to = { processor = "late" } },
                { from = { processor = "late" }, to = { stream = "end" } },
                { from = { processor = "reject" }, to = { processor = "tag" } },
                { from = { processor = "tag" }, to = { stream = "end" } },
            ]
            "#,
        );

        let mut stream = ApiStream::request("GET", "api.com/x").with_header("x-condition", "deny");
        let actions = runtime.execute_flow(&mut stream).await;

        assert_eq!(actions.early_response().map(|r| r.status), Some(403));
        assert!(actions.response.is_empty());
        assert_eq!(stream.header("x-trail"), Some("check"));
        // `late` sits behind the response root and must not run.
        assert_eq!(runtime.contexts().flow("guarded").get("last"), Ok(serde_json::json!("tag")));
    }

    #[tokio::test]
    async fn test_response_runs_in_reverse_order() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "outer"
            filter = { url = "api.com/*" }
            processors = { O = { processor = "Scripted" } }
            response = [
                { from = { stream = "start" }, to = { processor = "O" } },
                { from = { processor = "O" }, to = { stream = "end" } },
            ]

            [[flows]]
            name = "inner"
            filter = { url = "api.com/v1/orders" }
            processors = { I = { processor = "Scripted" } }
            response = [
                { from = { stream = "start" }, to = { processor = "I" } },
                { from = { processor = "I" }, to = { stream = "end" } },
            ]
            "#,
        );
        let request = ApiStream::request("GET", "api.com/v1/orders");
        let mut stream = ApiStream::response_to(&request, 200);

        // Request order is inner (more specific) then outer.
        runtime.execute_flow(&mut stream).await;
        assert_eq!(stream.header("x-trail"), Some("O,I"));
    }

    #[tokio::test]
    async fn test_reload_error_keeps_current_snapshot() {
        let runtime = runtime(BRANCHING);
        let broken = parse_config(
            r#"
            [[flows]]
            name = "broken"
            filter = { url = "api.com/*" }
            processors = { P1 = { processor = "DoesNotExist" } }
            request = [
                { from = { stream = "start" }, to = { processor = "P1" } },
                { from = { processor = "P1" }, to = { stream = "end" } },
            ]
            "#,
        )
        .unwrap();

        assert!(matches!(runtime.load(&broken), Err(BuildError::Processor { .. })));
        assert_eq!(runtime.snapshot().flow_names(), vec!["branching"]);
        assert_eq!(runtime.metrics().active_flows(), vec!["branching"]);
    }

    #[tokio::test]
    async fn test_unmatched_stream_passes_through() {
        let runtime = runtime(BRANCHING);
        let mut stream = ApiStream::request("GET", "elsewhere.com/x");
        assert!(runtime.execute_flow(&mut stream).await.is_empty());
        assert_eq!(runtime.metrics().requests_through_flows(), 0);
    }

    #[tokio::test]
    async fn test_retry_action_recorded_on_response() {
        let runtime = runtime(
            r#"
            [[flows]]
            name = "retrying"
            filter = { url = "api.com/*" }
            processors = { retry = { processor = "Retry", parameters = { attempts = 1 } }, after = { processor = "Scripted" } }
            response = [
                { from = { stream = "start" }, to = { processor = "retry" } },
                { from = { processor = "retry", condition = "retry" }, to = { processor = "after" } },
                { from = { processor = "retry", condition = "failed" }, to = { stream = "end" } },
                { from = { processor = "after" }, to = { stream = "end" } },
            ]
            "#,
        );
        let request = ApiStream::request("GET", "api.com/x").with_sequence_id("seq");

        let mut first = ApiStream::response_to(&request, 503);
        let actions = runtime.execute_flow(&mut first).await;
        assert!(actions.wants_retry());
        assert_eq!(first.header("x-trail"), None);

        let mut second = ApiStream::response_to(&request, 503);
        let actions = runtime.execute_flow(&mut second).await;
        assert!(!actions.wants_retry());
    }
}
