//! Concurrent transactions against shared quotas and metrics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;

use flow_gateway::clock::SystemClock;
use flow_gateway::observability::{MetricsCollector, MetricsUpdate};
use flow_gateway::runtime::ApiStream;

mod common;

const LIMITED: &str = r#"
    [[quotas]]
    id = "per_tenant"
    limit = 10
    window_seconds = 60
    group_by_header = "x-tenant"

    [[flows]]
    name = "limited"
    filter = { url = "api.example.com/*" }

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
"#;

async fn rejected(runtime: &flow_gateway::Runtime, tenant: &str, count: usize) -> usize {
    let runs = (0..count).map(|_| async move {
        let mut stream = ApiStream::request("GET", "api.example.com/items").with_header("x-tenant", tenant);
        runtime.execute_flow(&mut stream).await
    });
    join_all(runs)
        .await
        .iter()
        .filter(|actions| actions.early_response().map(|r| r.status) == Some(429))
        .count()
}

#[tokio::test]
async fn test_quota_admits_exactly_limit_under_concurrency() {
    let runtime = common::runtime(LIMITED);

    assert_eq!(rejected(&runtime, "acme", 50).await, 40);
    // Other tenants count separately.
    assert_eq!(rejected(&runtime, "globex", 10).await, 0);
}

#[tokio::test]
async fn test_metrics_aggregated_off_the_hot_path() {
    let metrics = Arc::new(MetricsCollector::new(256));
    let updates = Arc::new(AtomicUsize::new(0));
    let seen = updates.clone();
    metrics.register_observer(Arc::new(move |update: &MetricsUpdate| {
        if matches!(update, MetricsUpdate::Flow { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    }));
    let _workers = metrics.spawn();

    let runtime = common::runtime_with(LIMITED, Arc::new(SystemClock), metrics.clone());
    rejected(&runtime, "acme", 12).await;

    common::eventually(|| metrics.flow_stats("limited").map(|s| s.count) == Some(12)).await;
    common::eventually(|| updates.load(Ordering::SeqCst) == 12).await;

    let processors = metrics.processor_stats();
    let limit = &processors[&("limited".to_string(), "limit".to_string())];
    let reject = &processors[&("limited".to_string(), "reject".to_string())];
    assert_eq!(limit.count, 12);
    assert_eq!(reject.count, 2);
    assert_eq!(limit.failures, 0);
    assert_eq!(metrics.flow_stats("limited").unwrap().failures, 0);
    assert_eq!(metrics.requests_through_flows(), 12);
    assert_eq!(metrics.flow_invocations(), 12);
}

#[tokio::test]
async fn test_full_channel_drops_instead_of_blocking() {
    let metrics = Arc::new(MetricsCollector::new(1));
    let runtime = common::runtime_with(LIMITED, Arc::new(SystemClock), metrics.clone());

    rejected(&runtime, "acme", 5).await;

    assert!(metrics.dropped() > 0);
    assert_eq!(metrics.requests_through_flows(), 5);
}
