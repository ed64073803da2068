//! Integration tests for pairing app and tester sockets into sessions:
//! relaying, peer notifications, teardown, diagnostics endpoints, the
//! connection limit, and graceful shutdown.

mod common;

use common::*;
use futures::StreamExt;
use pairbroker::api::AppState;
use pairbroker::config::BrokerConfig;
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_tester_and_app_relay_both_ways() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let (mut tester_tx, mut tester_rx) = login(addr, "tester", "s1").await;
    let (mut app_tx, mut app_rx) = login(addr, "app", "s1").await;

    let notice = recv_json(&mut tester_rx).await;
    assert_eq!(notice, json!({ "type": "appConnected" }));

    let invoke = json!({ "type": "invoke", "params": { "target": "login-button" }, "messageId": 1 });
    send_json(&mut tester_tx, invoke.clone()).await;
    assert_eq!(recv_json(&mut app_rx).await, invoke);

    let result = json!({ "type": "invokeResult", "params": { "ok": true }, "messageId": 1 });
    send_json(&mut app_tx, result.clone()).await;
    assert_eq!(recv_json(&mut tester_rx).await, result);
}

#[tokio::test]
async fn test_tester_without_app_gets_error() {
    let state = create_state();
    let addr = start_server(state).await;

    let (mut tx, mut rx) = login(addr, "tester", "waiting").await;
    send_json(&mut tx, json!({ "type": "invoke", "messageId": 5 })).await;

    let reply = recv_json(&mut rx).await;
    assert_eq!(reply["type"], "serverError");
    assert_eq!(reply["messageId"], 5);
    let error = &reply["params"]["error"];
    assert_eq!(error["code"], "peer_not_connected");
    assert!(error.get("hint").is_none());
}

#[tokio::test]
async fn test_app_disconnect_notifies_tester_and_keeps_session() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let (_tester_tx, mut tester_rx) = login(addr, "tester", "s1").await;
    let (app_tx, app_rx) = login(addr, "app", "s1").await;
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appConnected");

    drop(app_tx);
    drop(app_rx);

    let notice = recv_json(&mut tester_rx).await;
    assert_eq!(notice, json!({ "type": "appDisconnected" }));

    let session = state.manager.session("s1").expect("tester keeps the session");
    assert!(session.app().is_none());
    assert!(session.tester().is_some());
}

#[tokio::test]
async fn test_session_removed_when_both_sides_leave() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let tester = login(addr, "tester", "s1").await;
    let app = login(addr, "app", "s1").await;
    assert_eq!(state.manager.session_count(), 1);

    drop(app);
    drop(tester);

    assert!(eventually(|| state.manager.session_count() == 0).await);
    assert!(eventually(|| state.manager.connection_count() == 0).await);
    assert_eq!(state.manager.invariant_violations(), 0);
}

#[tokio::test]
async fn test_app_can_rejoin_after_disconnect() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let (mut tester_tx, mut tester_rx) = login(addr, "tester", "s1").await;
    let first_app = login(addr, "app", "s1").await;
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appConnected");
    drop(first_app);
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appDisconnected");

    let (_app_tx, mut app_rx) = login(addr, "app", "s1").await;
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appConnected");

    send_json(&mut tester_tx, json!({ "type": "invoke" })).await;
    assert_eq!(recv_json(&mut app_rx).await["type"], "invoke");
}

#[tokio::test]
async fn test_second_app_takes_over_slot() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let (mut tester_tx, mut tester_rx) = login(addr, "tester", "s1").await;
    let (_old_tx, mut old_rx) = login(addr, "app", "s1").await;
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appConnected");
    let (_new_tx, mut new_rx) = login(addr, "app", "s1").await;
    assert_eq!(recv_json(&mut tester_rx).await["type"], "appConnected");

    send_json(&mut tester_tx, json!({ "type": "invoke" })).await;
    assert_eq!(recv_json(&mut new_rx).await["type"], "invoke");
    assert!(try_recv_json(&mut old_rx, Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let state = create_state();
    let addr = start_server(state).await;

    let (mut tester_a_tx, _tester_a_rx) = login(addr, "tester", "a").await;
    let (_app_a_tx, mut app_a_rx) = login(addr, "app", "a").await;
    let (_app_b_tx, mut app_b_rx) = login(addr, "app", "b").await;

    send_json(&mut tester_a_tx, json!({ "type": "invoke" })).await;
    assert_eq!(recv_json(&mut app_a_rx).await["type"], "invoke");
    assert!(try_recv_json(&mut app_b_rx, Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_server(create_state()).await;
    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_sessions_endpoint_lists_slots() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let _tester = login(addr, "tester", "beta").await;
    let _app = login(addr, "app", "alpha").await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/sessions", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let sessions = body.as_array().expect("array of sessions");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["id"], "alpha");
    assert!(sessions[0]["app"].is_u64());
    assert!(sessions[0]["tester"].is_null());
    assert_eq!(sessions[1]["id"], "beta");
    assert!(sessions[1]["app"].is_null());
    assert!(sessions[1]["tester"].is_u64());
}

#[tokio::test]
async fn test_connection_limit_rejects_upgrade() {
    let state = AppState::new(BrokerConfig {
        max_connections: 1,
        ..BrokerConfig::default()
    });
    let addr = start_server(state.clone()).await;

    let _first = connect(addr).await;
    assert!(eventually(|| state.manager.connection_count() == 1).await);

    let second = tokio_tungstenite::connect_async(format!("ws://{}/", addr)).await;
    match second {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_shutdown_sends_close_frame() {
    let state = create_state();
    let addr = start_server(state.clone()).await;

    let (_tx, mut rx) = login(addr, "tester", "s1").await;
    state.shutdown.shutdown();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.next())
        .await
        .expect("timeout waiting for close")
        .expect("stream ended")
        .expect("ws error");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(frame.reason.as_str(), "server shutting down"),
        other => panic!("expected close frame, got {:?}", other),
    }

    assert!(eventually(|| state.manager.session_count() == 0).await);
    assert!(state.shutdown.wait_for_drain(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_null_params_reach_peer_unchanged() {
    let state = create_state();
    let addr = start_server(state).await;

    let (mut tester_tx, _tester_rx) = login(addr, "tester", "s1").await;
    let (_app_tx, mut app_rx) = login(addr, "app", "s1").await;

    let action = json!({ "type": "reloadReactNative", "params": null, "messageId": 9 });
    send_json(&mut tester_tx, action.clone()).await;
    assert_eq!(recv_json(&mut app_rx).await, action);
}
