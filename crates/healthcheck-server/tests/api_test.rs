//! Integration tests for the HTTP API

use axum::body::Body;
use axum::http::{Request, StatusCode};
use healthcheck::ProbeSet;
use healthcheck_server::types::{CpuMetrics, SystemMetrics};
use healthcheck_server::{
    Engine, MemoryStore, SchedulerConfig, ServerConfig, StaticMetricsSource, router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn engine() -> (Engine, Arc<StaticMetricsSource>) {
    let config = ServerConfig {
        scheduler: SchedulerConfig {
            jitter: false,
            ..SchedulerConfig::default()
        },
        ..ServerConfig::default()
    };
    let source = Arc::new(StaticMetricsSource::new());
    let engine = Engine::start_with_store(
        &config,
        ProbeSet::with_defaults().unwrap(),
        source.clone(),
        Arc::new(MemoryStore::new()),
    )
    .await
    .unwrap();
    (engine, source)
}

async fn send(engine: &Engine, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router(engine.api_state()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

fn web_check() -> Value {
    json!({
        "name": "web",
        "type": "http",
        "target": "http://127.0.0.1:9/health",
        "interval": "10s",
        "timeout": "2s"
    })
}

#[tokio::test]
async fn test_create_and_get_check() {
    let (engine, _) = engine().await;

    let (status, created) = send(&engine, "POST", "/api/health-checks", Some(web_check())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "web");
    assert_eq!(created["status"], "unknown");
    assert_eq!(created["interval"], "10s");
    assert_eq!(created["method"], "GET");
    assert_eq!(created["enabled"], true);

    let id = created["id"].as_u64().unwrap();
    let (status, fetched) = send(&engine, "GET", &format!("/api/health-checks/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["target"], "http://127.0.0.1:9/health");
}

#[tokio::test]
async fn test_invalid_definition_is_rejected() {
    let (engine, _) = engine().await;

    let mut body = web_check();
    body["timeout"] = json!("30s");
    let (status, error) = send(&engine, "POST", "/api/health-checks", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "invalid_definition");
    assert!(error["message"].as_str().unwrap().contains("timeout"));

    // durations have exactly one representation
    let mut body = web_check();
    body["interval"] = json!(10);
    let (status, error) = send(&engine, "POST", "/api/health-checks", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "invalid_definition");

    let (_, list) = send(&engine, "GET", "/api/health-checks", None).await;
    assert_eq!(list["summary"]["total"], 0);
}

#[tokio::test]
async fn test_update_and_delete() {
    let (engine, _) = engine().await;
    let (_, created) = send(&engine, "POST", "/api/health-checks", Some(web_check())).await;
    let uri = format!("/api/health-checks/{}", created["id"]);

    let mut body = web_check();
    body["name"] = json!("web-renamed");
    body["enabled"] = json!(false);
    let (status, updated) = send(&engine, "PUT", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "web-renamed");
    assert_eq!(updated["enabled"], false);
    assert_eq!(updated["created_at"], created["created_at"]);

    let (status, _) = send(&engine, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, error) = send(&engine, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "not_found");

    let (status, _) = send(&engine, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&engine, "PUT", &uri, Some(web_check())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_preserves_creation_order() {
    let (engine, _) = engine().await;
    for name in ["zeta", "alpha", "mid"] {
        let mut body = web_check();
        body["name"] = json!(name);
        send(&engine, "POST", "/api/health-checks", Some(body)).await;
    }

    let (status, list) = send(&engine, "GET", "/api/health-checks", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = list["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(list["summary"]["unknown"], 3);
}

#[tokio::test]
async fn test_system_metrics_endpoint() {
    let (engine, source) = engine().await;

    let (status, _) = send(&engine, "GET", "/api/metrics", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    source
        .update(SystemMetrics {
            cpu: CpuMetrics {
                total_usage: 37.5,
                ..CpuMetrics::default()
            },
            ..SystemMetrics::default()
        })
        .await;

    let (status, metrics) = send(&engine, "GET", "/api/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["cpu"]["total_usage"], 37.5);

    let (_, snapshot) = send(&engine, "GET", "/api/snapshot", None).await;
    assert_eq!(snapshot["system"]["cpu"]["total_usage"], 37.5);
    assert!(snapshot["generated_at"].is_string());
}

#[tokio::test]
async fn test_prometheus_endpoint() {
    let (engine, _) = engine().await;
    send(&engine, "POST", "/api/health-checks", Some(web_check())).await;

    let (status, body) = send(&engine, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("golem_checks_active 1"));
    assert!(text.contains(r#"golem_checks_by_status{status="unknown"} 1"#));
    assert!(text.contains(r#"op="create""#));
}
