// =============================================================================
// WebSocket Handler — event push feed
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive every engine event as one JSON
// text frame, in publication order. The handler:
//
//   - Forwards events from the broadcast bus as they arrive.
//   - Responds to Ping frames with Pong frames.
//   - Treats inbound text as a heartbeat and otherwise ignores it.
//   - Skips ahead (with a warning) if the client falls behind the bus.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app_state::AppState;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("websocket connection accepted");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle: forward bus events and
/// service inbound frames concurrently via `tokio::select!`.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            // ── Push loop: forward every bus event ──────────────────────
            ev = events.recv() => {
                match ev {
                    Ok(event) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if let Err(e) = sender.send(Message::Text(json)).await {
                                    debug!(error = %e, "websocket send failed");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to serialise event");
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagged behind event bus");
                    }
                    Err(RecvError::Closed) => {
                        info!("event bus closed");
                        break;
                    }
                }
            }

            // ── Recv loop: service inbound frames ───────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(msg = %text, "websocket text received (heartbeat)");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("websocket close frame received");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("websocket binary message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error");
                        break;
                    }
                    None => {
                        info!("websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    info!("websocket connection closed");
}
