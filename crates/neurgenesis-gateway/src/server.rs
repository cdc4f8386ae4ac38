//! Gateway server: REST surface over the swarm plus a snapshot WebSocket

use crate::error::{ApiError, ApiResult};
use crate::report::{NodeReport, StateReport};
use crate::ws::handle_connection;
use axum::{
    extract::{Path as AxumPath, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use neurgenesis_core::{Error, GatewayConfig, Identity, NodeId};
use neurgenesis_swarm::consensus::ConsensusResult;
use neurgenesis_swarm::{Selection, Swarm, SwarmStatus};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for handlers.
pub struct GatewayState {
    pub swarm: Arc<Swarm>,
    pub started_at: std::time::Instant,
}

impl GatewayState {
    pub fn new(swarm: Arc<Swarm>) -> Self {
        Self { swarm, started_at: std::time::Instant::now() }
    }
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/state", get(state_handler))
        .route("/api/nodes", get(nodes_handler))
        .route("/api/nodes/:id", get(node_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/logs", get(logs_handler))
        .route("/api/running", post(running_handler))
        .route("/api/anomaly", post(anomaly_handler))
        .route("/api/memetic", post(memetic_handler))
        .route("/api/memetic/reset", post(memetic_reset_handler))
        .route("/api/identity/:id", post(identity_handler))
        .route("/api/consensus", post(consensus_handler))
        .route("/api/autonomy", post(autonomy_handler))
        .route("/api/select", get(selection_handler).post(select_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn start_gateway(
    config: GatewayConfig,
    swarm: Arc<Swarm>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let state = Arc::new(GatewayState::new(swarm));
    let app = router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;

    info!("Neurgenesis Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: http://{}", bind_addr);
    info!("  WebSocket:    ws://{}/ws", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

// ============================================================
// Read surface
// ============================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let status = state.swarm.status();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "running": status.running,
        "tick": status.tick,
        "nodes": status.node_count,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn state_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let snapshot = state.swarm.snapshot();
    let report = StateReport::new(&snapshot, state.swarm.status(), state.swarm.selection().await);
    Json(report).into_response()
}

async fn nodes_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let snapshot = state.swarm.snapshot();
    let nodes: Vec<NodeReport> = snapshot.nodes.iter().map(NodeReport::from).collect();
    Json(nodes).into_response()
}

async fn node_handler(
    AxumPath(id): AxumPath<String>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Response> {
    let snapshot = state.swarm.snapshot();
    let node = snapshot
        .node(&NodeId::new(id.as_str()))
        .ok_or_else(|| Error::node_not_found(id.as_str()))?;
    Ok(Json(NodeReport::from(node)).into_response())
}

async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> Response {
    Json(&state.swarm.snapshot().metrics_history).into_response()
}

async fn logs_handler(State(state): State<Arc<GatewayState>>) -> Response {
    Json(&state.swarm.snapshot().logs).into_response()
}

async fn selection_handler(State(state): State<Arc<GatewayState>>) -> Json<Selection> {
    Json(state.swarm.selection().await)
}

// ============================================================
// Controls
// ============================================================

#[derive(Deserialize)]
struct RunningBody {
    running: bool,
}

async fn running_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<RunningBody>,
) -> Json<SwarmStatus> {
    state.swarm.set_running(body.running);
    Json(state.swarm.status())
}

async fn anomaly_handler(State(state): State<Arc<GatewayState>>) -> Json<SwarmStatus> {
    state.swarm.inject_anomaly().await;
    Json(state.swarm.status())
}

#[derive(Deserialize)]
struct MemeticBody {
    target: NodeId,
    concept: String,
}

async fn memetic_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<MemeticBody>,
) -> ApiResult<Json<SwarmStatus>> {
    let concept = body.concept.trim();
    if concept.is_empty() {
        return Err(ApiError(Error::InvalidInput("concept must not be empty".into())));
    }
    state.swarm.inject_meme(&body.target, concept).await?;
    Ok(Json(state.swarm.status()))
}

async fn memetic_reset_handler(State(state): State<Arc<GatewayState>>) -> Json<SwarmStatus> {
    state.swarm.reset_infection().await;
    Json(state.swarm.status())
}

async fn identity_handler(
    AxumPath(id): AxumPath<String>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Json<Identity>> {
    let identity = state.swarm.forge_identity(&NodeId::new(id)).await?;
    Ok(Json(identity))
}

#[derive(Deserialize)]
struct ConsensusBody {
    proposal: String,
}

async fn consensus_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<ConsensusBody>,
) -> ApiResult<Json<ConsensusResult>> {
    let proposal = body.proposal.trim();
    if proposal.is_empty() {
        return Err(ApiError(Error::InvalidInput("proposal must not be empty".into())));
    }
    Ok(Json(state.swarm.run_consensus(proposal).await))
}

#[derive(Deserialize)]
struct AutonomyBody {
    enabled: bool,
}

async fn autonomy_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<AutonomyBody>,
) -> Json<SwarmStatus> {
    state.swarm.set_self_allocation(body.enabled).await;
    Json(state.swarm.status())
}

async fn select_handler(
    State(state): State<Arc<GatewayState>>,
    Json(selection): Json<Selection>,
) -> Json<Selection> {
    state.swarm.select(selection.clone()).await;
    Json(selection)
}
