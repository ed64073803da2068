//! Per-connection handler state machine.
//!
//! ```text
//! Anonymous --login(app)----> App
//!           \-login(tester)-> Tester
//! ```
//!
//! Every connection starts out [`ConnectionHandler::Anonymous`]. A valid
//! `login` moves it to one of the role-bound states for the rest of its life;
//! there is no way back.
//!
//! Handlers do not hold on to the [`SessionManager`]. It is passed in through
//! [`HandlerContext`] on every call, so the registry, which stores the
//! connections, never ends up referenced by them.

mod anonymous;
mod relay;

pub use anonymous::{validate_login, AnonymousHandler};
pub use relay::{AppHandler, TesterHandler};

use crate::connection::Connection;
use crate::error::ProtocolError;
use crate::manager::SessionManager;
use crate::protocol::{Action, Role};

/// Everything a handler may touch while processing one event.
pub struct HandlerContext<'a> {
    pub manager: &'a SessionManager,
    pub connection: &'a Connection,
}

impl<'a> HandlerContext<'a> {
    pub fn new(manager: &'a SessionManager, connection: &'a Connection) -> Self {
        Self {
            manager,
            connection,
        }
    }
}

/// The state a connection is currently in.
#[derive(Debug, Clone)]
pub enum ConnectionHandler {
    Anonymous(AnonymousHandler),
    App(AppHandler),
    Tester(TesterHandler),
}

impl ConnectionHandler {
    pub fn anonymous() -> Self {
        ConnectionHandler::Anonymous(AnonymousHandler)
    }

    /// Role-bound successor for a connection that just logged in.
    pub fn bound(role: Role, session_id: impl Into<String>) -> Self {
        match role {
            Role::App => ConnectionHandler::App(AppHandler::new(session_id)),
            Role::Tester => ConnectionHandler::Tester(TesterHandler::new(session_id)),
        }
    }

    pub fn handle(&self, ctx: &HandlerContext<'_>, action: Action) -> Result<(), ProtocolError> {
        match self {
            ConnectionHandler::Anonymous(handler) => handler.handle(ctx, action),
            ConnectionHandler::App(handler) => handler.handle(ctx, action),
            ConnectionHandler::Tester(handler) => handler.handle(ctx, action),
        }
    }

    /// Runs once when the socket closes; unregisters the connection.
    pub fn on_close(&self, ctx: &HandlerContext<'_>) {
        match self {
            ConnectionHandler::Anonymous(_) => {
                ctx.manager.unregister_connection(ctx.connection.id());
            }
            ConnectionHandler::App(handler) => handler.on_close(ctx),
            ConnectionHandler::Tester(handler) => handler.on_close(ctx),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            ConnectionHandler::Anonymous(_) => None,
            ConnectionHandler::App(_) => Some(Role::App),
            ConnectionHandler::Tester(_) => Some(Role::Tester),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionHandler::Anonymous(_) => "anonymous",
            ConnectionHandler::App(_) => "app",
            ConnectionHandler::Tester(_) => "tester",
        }
    }
}
