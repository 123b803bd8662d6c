//! End-to-end tests against a real bound listener, mirroring the server's
//! own e2e harness shape: bind `127.0.0.1:0`, spawn `run_serve_on_listener`,
//! then drive it with `reqwest`. `[e2e] received: ...` lines are printed on
//! failures so `cargo test -- --nocapture` shows the wire content.

use std::sync::Arc;
use std::time::Duration;

use config::PipelineConfig;
use pipeline::{
    InMemoryPipelineStateStore, InMemoryUsageStore, MockLlm, PipelineState, ProfileModelRouter,
    StageToolkits,
};
use serve::AppState;
use tokio::net::TcpListener;

async fn spawn_server() -> (String, Arc<dyn pipeline::PipelineStateStore>) {
    let store: Arc<dyn pipeline::PipelineStateStore> = Arc::new(InMemoryPipelineStateStore::new());
    let usage_store: Arc<dyn pipeline::UsageStore> = Arc::new(InMemoryUsageStore::new());
    let router = ProfileModelRouter::new(Arc::new(MockLlm::with_text("done")));
    let mut config = PipelineConfig::default();
    config.max_global_pipelines = 1;
    config.max_pipelines_per_user = 1;
    let state = Arc::new(AppState::new(
        store.clone(),
        usage_store,
        router,
        StageToolkits::new(),
        config,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve::run_serve_on_listener(listener, state));
    tokio::time::sleep(Duration::from_millis(50)).await;
    (format!("http://{addr}"), store)
}

#[tokio::test]
async fn e2e_health_and_metrics_need_no_auth() {
    let (base, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let metrics = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);
    let body: serde_json::Value = metrics.json().await.unwrap();
    eprintln!("[e2e] received: {body}");
    assert!(body.get("status_2xx").is_some());
}

#[tokio::test]
async fn e2e_sessions_require_a_bearer_token() {
    let (base, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/sessions")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn e2e_create_list_and_start_a_session() {
    let (base, store) = spawn_server().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{base}/api/sessions"))
        .bearer_auth("user-1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    eprintln!("[e2e] received: {created}");
    let session_id = created["session"]["session_id"].as_str().unwrap().to_string();

    let listed: serde_json::Value = client
        .get(format!("{base}/api/sessions"))
        .bearer_auth("user-1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["sessions"].as_array().unwrap().len(), 1);

    let start_resp = client
        .post(format!("{base}/api/pipeline/start"))
        .bearer_auth("user-1")
        .json(&serde_json::json!({"session_id": session_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(start_resp.status(), 200);

    // The stage loop runs in a spawned task: `intake` isn't gate-bearing and
    // completes immediately, but `positioning` is and parks forever waiting
    // for a gate response nothing in this test sends. Give it a moment to
    // persist past `intake` and confirm it's parked there.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let saved = store.load(&session_id).await.unwrap().unwrap();
    assert_eq!(saved.stage.as_str(), "positioning");
}

#[tokio::test]
async fn e2e_other_users_session_reads_as_not_found() {
    let (base, store) = spawn_server().await;
    let client = reqwest::Client::new();

    let session = PipelineState::new("s-owned-by-u1", "user-1");
    store.save(&session).await.unwrap();

    let resp = client
        .get(format!("{base}/api/sessions/s-owned-by-u1/resume"))
        .bearer_auth("user-2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn e2e_respond_to_unknown_session_is_not_found() {
    let (base, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/pipeline/respond"))
        .bearer_auth("user-1")
        .json(&serde_json::json!({
            "session_id": "does-not-exist",
            "gate": "positioning",
            "response": {}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn e2e_second_global_pipeline_hits_capacity_limit() {
    let (base, store) = spawn_server().await;
    let client = reqwest::Client::new();

    let first = PipelineState::new("s1", "user-1");
    let second = PipelineState::new("s2", "user-1");
    store.save(&first).await.unwrap();
    store.save(&second).await.unwrap();

    let start_one = client
        .post(format!("{base}/api/pipeline/start"))
        .bearer_auth("user-1")
        .json(&serde_json::json!({"session_id": "s1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(start_one.status(), 200);

    let start_two = client
        .post(format!("{base}/api/pipeline/start"))
        .bearer_auth("user-1")
        .json(&serde_json::json!({"session_id": "s2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(start_two.status(), 503);
    let body: serde_json::Value = start_two.json().await.unwrap();
    assert_eq!(body["code"], "CAPACITY_LIMIT");
}
