//! WebSocket push of swarm snapshots
//!
//! On connect the client gets the current frame; after that, one frame per
//! committed snapshot. Client text is not interpreted beyond "ping".

use crate::report::StateReport;
use crate::server::GatewayState;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Render the current snapshot as one JSON frame.
pub async fn snapshot_frame(state: &GatewayState) -> Option<String> {
    let snapshot = state.swarm.snapshot();
    let report = StateReport::new(&snapshot, state.swarm.status(), state.swarm.selection().await);
    match serde_json::to_string(&serde_json::json!({ "type": "snapshot", "data": report })) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize snapshot: {}", e);
            None
        }
    }
}

pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut updates = state.swarm.subscribe();
    info!("Renderer connected");

    if let Some(frame) = snapshot_frame(&state).await {
        if ws_tx.send(WsMessage::Text(frame)).await.is_err() {
            return;
        }
    }
    let _ = updates.borrow_and_update();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) if text.trim() == "ping" => {
                        let pong = serde_json::json!({ "type": "pong" }).to_string();
                        if ws_tx.send(WsMessage::Text(pong)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        debug!("Ignoring client text: {}", text);
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("Renderer disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return;
                    }
                    None => return,
                    _ => {} // Binary, Ping, Pong
                }
            }

            changed = updates.changed() => {
                if changed.is_err() {
                    info!("Swarm stopped publishing");
                    return;
                }
                let _ = updates.borrow_and_update();
                if let Some(frame) = snapshot_frame(&state).await {
                    if ws_tx.send(WsMessage::Text(frame)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
