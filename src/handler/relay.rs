use super::HandlerContext;
use crate::error::ProtocolError;
use crate::protocol::{Action, Role, APP_CONNECTED, APP_DISCONNECTED};

/// Why [`forward`] could not hand an action over.
enum Undelivered {
    /// The sender has no peer in its session.
    NoPeer(Action),
    /// The peer's socket is closing or its outbound buffer is full.
    Backlogged(Action),
}

/// Forward `action` unchanged to the other side of the sender's session.
fn forward(ctx: &HandlerContext<'_>, action: Action) -> Result<(), Undelivered> {
    let Some(peer) = ctx.manager.peer_of(ctx.connection.id()) else {
        return Err(Undelivered::NoPeer(action));
    };
    peer.send_action(action).map_err(Undelivered::Backlogged)
}

/// State of a connection logged in as the app (device under test).
#[derive(Debug, Clone)]
pub struct AppHandler {
    session_id: String,
}

impl AppHandler {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Tell a waiting tester that its app has arrived.
    pub(crate) fn announce(&self, ctx: &HandlerContext<'_>) {
        let _ = forward(ctx, Action::new(APP_CONNECTED));
    }

    /// Actions from the app are dropped while no tester is listening.
    pub fn handle(&self, ctx: &HandlerContext<'_>, action: Action) -> Result<(), ProtocolError> {
        match forward(ctx, action) {
            Ok(()) => {}
            Err(Undelivered::NoPeer(action)) => {
                tracing::debug!(
                    connection = %ctx.connection.id(),
                    session_id = %self.session_id,
                    kind = %action.kind,
                    "no tester in session, dropping app action"
                );
            }
            Err(Undelivered::Backlogged(action)) => {
                tracing::warn!(
                    connection = %ctx.connection.id(),
                    session_id = %self.session_id,
                    kind = %action.kind,
                    "tester not accepting actions, dropping app action"
                );
            }
        }
        Ok(())
    }

    pub fn on_close(&self, ctx: &HandlerContext<'_>) {
        let _ = forward(ctx, Action::new(APP_DISCONNECTED));
        ctx.manager.unregister_connection(ctx.connection.id());
    }
}

/// State of a connection logged in as the tester (test runner).
#[derive(Debug, Clone)]
pub struct TesterHandler {
    session_id: String,
}

impl TesterHandler {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The tester expects every action to reach the app, so anything that
    /// keeps it from getting there is reported back.
    pub fn handle(&self, ctx: &HandlerContext<'_>, action: Action) -> Result<(), ProtocolError> {
        forward(ctx, action).map_err(|undelivered| match undelivered {
            Undelivered::NoPeer(action) => ProtocolError::PeerNotConnected {
                role: Role::App,
                session_id: self.session_id.clone(),
                action,
            },
            Undelivered::Backlogged(action) => ProtocolError::PeerBacklogged {
                role: Role::App,
                session_id: self.session_id.clone(),
                action,
            },
        })
    }

    pub fn on_close(&self, ctx: &HandlerContext<'_>) {
        ctx.manager.unregister_connection(ctx.connection.id());
    }
}
