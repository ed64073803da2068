#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use pairbroker::api::{self, AppState};
use pairbroker::config::BrokerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsTx = futures::stream::SplitSink<WsStream, Message>;
pub type WsRx = futures::stream::SplitStream<WsStream>;

/// Create broker state with default config.
pub fn create_state() -> AppState {
    AppState::new(BrokerConfig::default())
}

/// Serve the broker router on an ephemeral port.
pub async fn start_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

pub async fn connect(addr: SocketAddr) -> (WsTx, WsRx) {
    let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    ws.split()
}

pub async fn send_json(tx: &mut WsTx, value: serde_json::Value) {
    tx.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Receive next text message, parse as JSON.
pub async fn recv_json(rx: &mut WsRx) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), rx.next())
        .await
        .expect("timeout waiting for message")
        .expect("stream ended")
        .expect("ws error");
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("invalid JSON"),
        other => panic!("expected text message, got {:?}", other),
    }
}

/// Try to receive a JSON message within a timeout, returning None if nothing
/// arrived.
pub async fn try_recv_json(rx: &mut WsRx, timeout: Duration) -> Option<serde_json::Value> {
    match tokio::time::timeout(timeout, rx.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => Some(serde_json::from_str(text.as_str()).unwrap()),
        _ => None,
    }
}

/// Connect and log in, returning the socket halves after loginSuccess.
pub async fn login(addr: SocketAddr, role: &str, session_id: &str) -> (WsTx, WsRx) {
    let (mut tx, mut rx) = connect(addr).await;
    send_json(
        &mut tx,
        serde_json::json!({
            "type": "login",
            "params": { "role": role, "sessionId": session_id },
        }),
    )
    .await;
    let reply = recv_json(&mut rx).await;
    assert_eq!(reply["type"], "loginSuccess", "unexpected reply: {reply}");
    (tx, rx)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
