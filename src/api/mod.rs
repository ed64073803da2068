pub mod error;
mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::config::BrokerConfig;
use crate::manager::SessionManager;
use crate::shutdown::ShutdownCoordinator;

use handlers::*;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    pub shutdown: ShutdownCoordinator,
    pub config: Arc<BrokerConfig>,
    /// Sockets currently upgraded, bounded by `config.max_connections`.
    pub ws_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            manager: SessionManager::new(),
            shutdown: ShutdownCoordinator::new(),
            config: Arc::new(config),
            ws_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Build the HTTP/WebSocket router.
///
/// Clients connect their WebSocket to `/` (or `/ws`). `/health` and
/// `/sessions` are read-only diagnostics.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_connect))
        .route("/ws", get(ws_connect))
        .route("/health", get(health))
        .route("/sessions", get(session_list))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
