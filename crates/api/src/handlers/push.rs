//! # Push Ingestion
//!
//! Two ways for the push transport to reach the hub: one envelope per
//! webhook call, or a long-lived upstream WebSocket. While the socket is open
//! the hub counts as connected. Closing it marks every view offline and the
//! next connection is treated as a reconnect.

use axum::{
    Json,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use slotsync_core::models::events::PushEnvelope;
use slotsync_sync::channel::LocalPushHub;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::ApiState;

#[derive(Debug, Serialize)]
pub struct PushAccepted {
    pub delivered: usize,
}

/// Deliver one envelope to the room's subscribers.
///
/// # Endpoint
///
/// ```text
/// POST /api/push
/// {"room": "business:b1", "event": "appointmentCreated", "data": {...}}
/// ```
pub async fn ingest(
    State(state): State<Arc<ApiState>>,
    Json(envelope): Json<PushEnvelope>,
) -> (StatusCode, Json<PushAccepted>) {
    let delivered = state.hub.publish(&envelope);
    (StatusCode::ACCEPTED, Json(PushAccepted { delivered }))
}

pub async fn upstream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_feed(socket, hub))
}

async fn run_feed(socket: WebSocket, hub: LocalPushHub) {
    let (mut sender, mut receiver) = socket.split();
    let mut outbound = hub.outbound();
    hub.set_connected(true);
    info!("upstream push feed connected");

    // Envelopes from the transport go to the local rooms
    let inbound_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<PushEnvelope>(&text) {
                    Ok(envelope) => {
                        inbound_hub.publish(&envelope);
                    }
                    Err(e) => debug!(error = %e, "dropping malformed push frame"),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "upstream push feed failed");
                    break;
                }
            }
        }
    });

    // Events emitted by local sessions go upstream
    let mut send_task = tokio::spawn(async move {
        loop {
            let envelope = match outbound.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "upstream push feed fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "could not encode push envelope");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Wait for either side to finish
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    hub.set_connected(false);
    info!("upstream push feed disconnected");
}
