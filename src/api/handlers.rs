use axum::{
    extract::{
        connect_info::ConnectInfo,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::Extensions,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::connection::{Connection, ConnectionId, Transport};
use crate::error::ProtocolError;
use crate::manager::SessionManager;
use crate::protocol::Action;
use crate::session::Session;

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(super) async fn session_list(State(state): State<AppState>) -> Json<Vec<Session>> {
    Json(state.manager.list_sessions())
}

/// Releases a socket slot when the socket task ends (or never starts).
struct SlotGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Release);
    }
}

fn acquire_slot(state: &AppState) -> Result<SlotGuard, ApiError> {
    if state.shutdown.is_shutting_down() {
        return Err(ApiError::ShuttingDown);
    }
    let max = state.config.max_connections;
    let current = state.ws_count.fetch_add(1, Ordering::AcqRel);
    if current >= max {
        state.ws_count.fetch_sub(1, Ordering::Release);
        tracing::warn!(max, "socket limit reached, rejecting upgrade");
        return Err(ApiError::TooManyConnections);
    }
    Ok(SlotGuard {
        counter: Arc::clone(&state.ws_count),
    })
}

pub(super) async fn ws_connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    extensions: Extensions,
) -> Response {
    let slot = match acquire_slot(&state) {
        Ok(slot) => slot,
        Err(e) => return e.into_response(),
    };
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state, peer).await;
        drop(slot);
    })
}

/// Decode one text frame and feed it to the connection's handler.
fn dispatch_text(
    manager: &SessionManager,
    connection: &Connection,
    text: &str,
) -> Result<(), ProtocolError> {
    let action: Action = serde_json::from_str(text)?;
    connection.dispatch(manager, action)
}

async fn handle_socket(socket: WebSocket, state: AppState, peer: Option<SocketAddr>) {
    let (_guard, mut shutdown_rx) = state.shutdown.register();

    let id = ConnectionId::next();
    let (transport, mut outbound_rx) = Transport::channel(peer, state.config.outbound_buffer);
    let Some(connection) = state.manager.register_connection(id, transport) else {
        return;
    };
    tracing::debug!(connection = %id, ?peer, "socket accepted");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(action) = outbound else { break };
                match serde_json::to_string(&action) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(connection = %id, kind = %action.kind, ?e, "failed to encode action");
                    }
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = dispatch_text(&state.manager, &connection, text.as_str()) {
                            tracing::warn!(connection = %id, code = err.code(), %err, "rejected action");
                            let _ = connection.send_action(Action::server_error(&err));
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(connection = %id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection = %id, ?e, "socket error");
                        break;
                    }
                    _ => continue,
                }
            }

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!(connection = %id, "socket received shutdown signal, closing");
                    let close_frame = CloseFrame {
                        code: axum::extract::ws::close_code::NORMAL,
                        reason: "server shutting down".into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(close_frame))).await;
                    let _ = ws_tx.flush().await;
                    break;
                }
            }
        }
    }

    connection.close(&state.manager);
    tracing::debug!(connection = %id, "socket closed");
}
