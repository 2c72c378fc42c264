//! WebSocket handler: transport adapter between a socket and the coordinator.
//!
//! DESIGN
//! ======
//! On upgrade, registers with the coordinator and enters a `select!` loop:
//! - Incoming text frames → decode → `CoordinatorHandle::inbound`
//! - Frames queued by the coordinator → serialize → socket
//!
//! The handler owns no session state. Everything it knows about rooms comes
//! back as `ServerFrame`s on the outbound channel.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `connect` (implicit join when `sessionId` is present)
//! 2. Client frames → decode → coordinator
//! 3. Close or socket error → `disconnect` (idempotent)
//!
//! ERROR HANDLING
//! ==============
//! Undecodable frames are dropped and logged; the connection stays open.
//! Unknown frame types are ignored at debug level.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::coordinator::CoordinatorError;
use crate::coordinator::registry::ConnectionId;
use crate::frame::{ErrorCode, ServerFrame, decode_client_frame};
use crate::state::AppState;

/// Query string accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, params))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, params: ConnectParams) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(state.config.outbound_capacity);

    let session_id = params.session_id.filter(|s| !s.is_empty());
    let user_id = params.user_id.filter(|s| !s.is_empty());
    let connection_id = match state
        .coordinator
        .connect(user_id, session_id.clone(), outbound_tx)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "ws: coordinator unavailable; closing socket");
            return;
        }
    };
    info!(%connection_id, session = ?session_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if dispatch_text(&state, connection_id, text.as_str()).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = state.coordinator.disconnect(connection_id).await {
        warn!(%connection_id, error = %e, "ws: disconnect not delivered");
    }
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode one inbound text frame and hand it to the coordinator. Fails only
/// when the coordinator has stopped.
async fn dispatch_text(state: &AppState, connection_id: ConnectionId, text: &str) -> Result<(), CoordinatorError> {
    match decode_client_frame(text) {
        Ok(frame) => state.coordinator.inbound(connection_id, frame).await,
        Err(e) if e.is_malformed() => {
            warn!(%connection_id, error = %e, code = e.error_code(), "ws: dropping malformed frame");
            Ok(())
        }
        Err(e) => {
            debug!(%connection_id, error = %e, "ws: ignoring frame");
            Ok(())
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = match frame.to_text() {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, kind = frame.kind(), "ws: failed to serialize frame");
            return Err(());
        }
    };
    debug!(kind = frame.kind(), "ws: send frame");
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "ws: socket send failed");
    })
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
