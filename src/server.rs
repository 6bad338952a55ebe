//! HTTP router and per-connection WebSocket tasks.
//!
//! Each accepted socket gets two tasks: a writer draining the connection's
//! outbound queue, and the read loop below dispatching client intents. A
//! failure while processing one message is reported to the client and the
//! loop keeps serving; only a closed socket ends the connection.

use crate::orchestrator::GameOrchestrator;
use crate::protocol::{
    CreateGamePayload, Envelope, JoinGamePayload, MSG_CREATE_GAME, MSG_JOIN_GAME, MSG_MAKE_MOVE,
    MakeMovePayload, ServerMessage,
};
use crate::registry::ClientConnection;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Builds the server router over a shared orchestrator.
pub fn app(orchestrator: GameOrchestrator) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws/{client_id}", get(ws_handler))
        .with_state(orchestrator)
}

async fn health() -> &'static str {
    "Side-Stacker server"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(orchestrator): State<GameOrchestrator>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, orchestrator))
}

/// Serves one client connection until its socket closes.
async fn handle_socket(socket: WebSocket, client_id: String, orchestrator: GameOrchestrator) {
    info!(%client_id, "WebSocket connection accepted");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection = ClientConnection::new(tx);
    let connection_id = connection.id();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!("Writer ending, socket closed");
                break;
            }
        }
    });

    let mut active_room: Option<String> = None;

    while let Some(frame) = ws_rx.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                debug!(%client_id, error = %e, "Socket receive failed");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                dispatch(
                    &orchestrator,
                    &connection,
                    &client_id,
                    &mut active_room,
                    text.as_str(),
                )
                .await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!(%client_id, room = ?active_room, "Client disconnected");
    orchestrator.connection_closed(connection_id).await;

    // With the binding released and our handle dropped, the writer's
    // queue has no senders left and the task drains out.
    drop(connection);
    let _ = writer.await;
}

/// Routes one inbound envelope to the matching orchestrator handler.
async fn dispatch(
    orchestrator: &GameOrchestrator,
    connection: &ClientConnection,
    client_id: &str,
    active_room: &mut Option<String>,
    raw: &str,
) {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%client_id, error = %e, "Invalid JSON frame");
            orchestrator
                .registry()
                .send(connection, ServerMessage::error("Invalid JSON format."));
            return;
        }
    };
    debug!(%client_id, kind = %envelope.kind, room = ?active_room, "Dispatching message");

    match envelope.kind.as_str() {
        MSG_CREATE_GAME => {
            let Some(payload) = decode_payload::<CreateGamePayload>(
                orchestrator,
                connection,
                &envelope.kind,
                envelope.payload,
            ) else {
                return;
            };
            match orchestrator.create_game(connection, client_id, payload) {
                Ok(room_id) => *active_room = Some(room_id),
                Err(fault) => {
                    orchestrator
                        .registry()
                        .send(connection, ServerMessage::error(fault.message));
                }
            }
        }
        MSG_JOIN_GAME => {
            let Some(payload) = decode_payload::<JoinGamePayload>(
                orchestrator,
                connection,
                &envelope.kind,
                envelope.payload,
            ) else {
                return;
            };
            match orchestrator.join_game(connection, client_id, payload) {
                Ok(room_id) => *active_room = Some(room_id),
                Err(fault) => {
                    orchestrator
                        .registry()
                        .send(connection, ServerMessage::error(fault.message));
                }
            }
        }
        MSG_MAKE_MOVE => {
            let Some(payload) = decode_payload::<MakeMovePayload>(
                orchestrator,
                connection,
                &envelope.kind,
                envelope.payload,
            ) else {
                return;
            };
            if let Err(fault) = orchestrator.make_move(active_room.as_deref(), payload).await {
                if fault.invalidates_session {
                    *active_room = None;
                }
                orchestrator
                    .registry()
                    .send(connection, ServerMessage::error(fault.message));
            }
        }
        other => {
            warn!(%client_id, kind = %other, "Unknown message type");
            orchestrator.registry().send(
                connection,
                ServerMessage::error(format!("Unknown message type: {other}")),
            );
        }
    }
}

/// Decodes a typed payload, reporting a typed error to the client on
/// failure.
fn decode_payload<T: DeserializeOwned>(
    orchestrator: &GameOrchestrator,
    connection: &ClientConnection,
    kind: &str,
    payload: serde_json::Value,
) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(kind, error = %e, "Malformed payload");
            orchestrator
                .registry()
                .send(connection, ServerMessage::error(format!("Invalid {kind} payload.")));
            None
        }
    }
}
