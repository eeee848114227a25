//! Snapshot replacement and configuration errors.

use flow_gateway::config::{parse_config, ConfigError};
use flow_gateway::runtime::{ApiStream, BuildError};

mod common;

const V1: &str = r#"
    [[flows]]
    name = "v1"
    filter = { url = "api.example.com/*" }
    processors = { P = { processor = "Recorder" } }
    request = [
        { from = { stream = "start" }, to = { processor = "P" } },
        { from = { processor = "P" }, to = { stream = "end" } },
    ]
"#;

const V2: &str = r#"
    [[flows]]
    name = "v2"
    filter = { url = "api.example.com/*" }
    processors = { Q = { processor = "Recorder" } }
    request = [
        { from = { stream = "start" }, to = { processor = "Q" } },
        { from = { processor = "Q" }, to = { stream = "end" } },
    ]
"#;

async fn trail(runtime: &flow_gateway::Runtime) -> String {
    let mut stream = ApiStream::request("GET", "api.example.com/x");
    runtime.execute_flow(&mut stream).await;
    common::trail(&stream).to_string()
}

#[tokio::test]
async fn test_reload_swaps_snapshot() {
    let runtime = common::runtime(V1);
    assert_eq!(trail(&runtime).await, "P");

    runtime.load(&parse_config(V2).unwrap()).unwrap();
    assert_eq!(runtime.snapshot().flow_names(), vec!["v2".to_string()]);
    assert_eq!(trail(&runtime).await, "Q");
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let runtime = common::runtime(V1);
    let broken = V2.replace("\"Recorder\"", "\"DoesNotExist\"");

    let result = runtime.load(&parse_config(&broken).unwrap());

    assert!(matches!(result, Err(BuildError::Processor { .. })));
    assert_eq!(runtime.snapshot().flow_names(), vec!["v1".to_string()]);
    assert_eq!(trail(&runtime).await, "P");
}

#[tokio::test]
async fn test_unknown_flow_reference_rejected() {
    let runtime = common::runtime(V1);
    let dangling = V2.replace("to = { stream = \"end\" } },\n    ]", "to = { flow = \"missing\" } },\n    ]");

    assert!(matches!(
        runtime.load(&parse_config(&dangling).unwrap()),
        Err(BuildError::Flow(_))
    ));
    assert_eq!(runtime.snapshot().flow_names(), vec!["v1".to_string()]);
}

#[tokio::test]
async fn test_metrics_track_active_flows() {
    let runtime = common::runtime(V1);
    assert_eq!(runtime.metrics().active_flows(), vec!["v1".to_string()]);

    runtime.load(&parse_config(V2).unwrap()).unwrap();
    assert_eq!(runtime.metrics().active_flows(), vec!["v2".to_string()]);
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let config = r#"
        [[quotas]]
        id = "q"
        limit = 1
        window_seconds = 0

        [[flows]]
        name = ""
        filter = { url = "api.example.com/*" }
    "#;

    match parse_config(config) {
        Err(ConfigError::Validation(errors)) => assert!(errors.len() >= 2),
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join(format!("flow-gateway-{}.toml", std::process::id()));
    std::fs::write(&path, V1).unwrap();

    let config = flow_gateway::config::load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.flows.len(), 1);
    assert_eq!(config.flows[0].name, "v1");
}
