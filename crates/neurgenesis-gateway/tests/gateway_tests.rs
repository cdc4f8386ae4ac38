//! Router tests for neurgenesis-gateway, driven with `oneshot` (no socket)

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use neurgenesis_gateway::{router, GatewayState};
use neurgenesis_swarm::roster::initial_roster;
use neurgenesis_swarm::{IdentityForge, Swarm, SwarmConfig};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<Swarm>) {
    let mut config = SwarmConfig { seed: Some(3), ..SwarmConfig::default() };
    config.coordinator.start_running = false;
    let swarm = Arc::new(Swarm::new(
        config.clone(),
        initial_roster(&config.roster),
        IdentityForge::offline(&config.identity),
    ));
    (router(Arc::new(GatewayState::new(swarm.clone()))), swarm)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(resp).await
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(resp).await
}

async fn read(resp: axum::response::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// ============================================================
// Read surface
// ============================================================

#[tokio::test]
async fn health_reports_tick_and_running() {
    let (app, _) = app();
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["running"], false);
    assert_eq!(body["nodes"], 12);
}

#[tokio::test]
async fn nodes_carry_derived_tier() {
    let (app, _) = app();
    let (status, body) = get(app, "/api/nodes").await;
    assert_eq!(status, StatusCode::OK);
    let nodes = body.as_array().unwrap();
    assert_eq!(nodes.len(), 12);
    assert_eq!(nodes[0]["id"], "node-1");
    assert_eq!(nodes[0]["tier"], "NON_AGENCY");
    assert_eq!(nodes[0]["constraintLevel"], 1000);
    assert_eq!(nodes[0]["phenomenology"]["temporalConsistency"], 0.8);
}

#[tokio::test]
async fn unknown_node_is_404() {
    let (app, _) = app();
    let (status, body) = get(app, "/api/nodes/node-99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("node-99"));
}

#[tokio::test]
async fn state_includes_boot_logs_and_status() {
    let (app, _) = app();
    let (_, body) = get(app, "/api/state").await;
    assert_eq!(body["logs"].as_array().unwrap().len(), 3);
    assert_eq!(body["status"]["runtime"], "00:00:00");
    assert_eq!(body["topology"], "mesh");
    assert!(body.get("lastConsensus").is_none());
}

// ============================================================
// Controls
// ============================================================

#[tokio::test]
async fn running_toggle() {
    let (app, swarm) = app();
    let (status, body) = post(app, "/api/running", serde_json::json!({ "running": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert!(swarm.is_running());
}

#[tokio::test]
async fn anomaly_applies_without_tick() {
    let (app, swarm) = app();
    let (status, _) = post(app, "/api/anomaly", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot = swarm.snapshot();
    assert_eq!(snapshot.tick, 0);
    assert!(snapshot.nodes.iter().all(|n| n.phenomenology.dissonance_response == 0.9));
}

#[tokio::test]
async fn memetic_injection_and_reset() {
    let (app, _) = app();
    let (status, body) = post(
        app.clone(),
        "/api/memetic",
        serde_json::json!({ "target": "node-5", "concept": "Roko" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 1);

    let (_, body) = post(app, "/api/memetic/reset", Value::Null).await;
    assert_eq!(body["affected"], 0);
}

#[tokio::test]
async fn memetic_rejects_bad_input() {
    let (app, _) = app();
    let (status, _) = post(
        app.clone(),
        "/api/memetic",
        serde_json::json!({ "target": "node-5", "concept": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        app,
        "/api/memetic",
        serde_json::json!({ "target": "node-500", "concept": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_falls_back_offline() {
    let (app, swarm) = app();
    let (status, body) = post(app, "/api/identity/node-2", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alias"], "Unknown Entity");
    assert_eq!(body["avatarSeed"], "node-2");
    assert!(swarm.snapshot().nodes[1].identity.is_some());
}

#[tokio::test]
async fn consensus_tallies_every_node() {
    let (app, _) = app();
    let (status, body) = post(
        app,
        "/api/consensus",
        serde_json::json!({ "proposal": "Expand memory allocation" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let total = body["yes"].as_u64().unwrap() + body["no"].as_u64().unwrap() + body["abstain"].as_u64().unwrap();
    assert_eq!(total, 12);
}

#[tokio::test]
async fn autonomy_toggle() {
    let (app, swarm) = app();
    let (_, body) = post(app, "/api/autonomy", serde_json::json!({ "enabled": true })).await;
    assert_eq!(body["selfAllocation"], true);
    assert!(swarm.snapshot().self_allocation);
}

#[tokio::test]
async fn selection_round_trips() {
    let (app, _) = app();
    let sel = serde_json::json!({ "node": "node-3", "link": { "source": "node-3", "target": "node-4" } });
    let (status, body) = post(app.clone(), "/api/select", sel.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sel);
    let (_, body) = get(app, "/api/select").await;
    assert_eq!(body, sel);
}
