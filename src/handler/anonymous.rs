use serde_json::Value;

use super::{ConnectionHandler, HandlerContext};
use crate::error::ProtocolError;
use crate::protocol::{Action, LoginParams, Role, LOGIN, LOGIN_SUCCESS};

/// State of a connection that has not logged in yet.
///
/// Only `login` is accepted; anything else is a client ordering bug.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousHandler;

impl AnonymousHandler {
    pub fn handle(&self, ctx: &HandlerContext<'_>, action: Action) -> Result<(), ProtocolError> {
        match action.kind.as_str() {
            LOGIN => self.handle_login(ctx, action),
            _ => Err(ProtocolError::DispatchedTooEarly { action }),
        }
    }

    fn handle_login(&self, ctx: &HandlerContext<'_>, action: Action) -> Result<(), ProtocolError> {
        let params = validate_login(&action)?;
        let connection = ctx.connection;

        let Some(session) = ctx.manager.register_session(connection.id(), &params) else {
            return Err(ProtocolError::AlreadyInSession {
                connection: connection.id(),
                action,
            });
        };

        let successor = ConnectionHandler::bound(params.role, session.id());
        connection.set_handler(successor.clone());
        tracing::info!(
            connection = %connection.id(),
            session_id = %session.id(),
            role = %params.role,
            "login succeeded"
        );

        if connection.send_action(action.renamed(LOGIN_SUCCESS)).is_err() {
            tracing::warn!(
                connection = %connection.id(),
                session_id = %session.id(),
                "loginSuccess not delivered, client will not see its login confirmed"
            );
        }
        if let ConnectionHandler::App(app) = successor {
            app.announce(ctx);
        }
        Ok(())
    }
}

/// Check a `login` action's params, in protocol order.
///
/// 1. `params` must be an object,
/// 2. `params.role` must be exactly `"app"` or `"tester"`,
/// 3. `params.sessionId` must be present,
/// 4. `params.sessionId` must be a string.
pub fn validate_login(action: &Action) -> Result<LoginParams, ProtocolError> {
    let Some(params) = action.params().and_then(Value::as_object) else {
        return Err(ProtocolError::LoginMissingParams {
            action: action.clone(),
        });
    };

    let Some(role) = params.get("role").and_then(Value::as_str).and_then(Role::from_wire) else {
        return Err(ProtocolError::LoginInvalidRole {
            action: action.clone(),
        });
    };

    let session_id = params.get("sessionId");
    if is_blank(session_id) {
        return Err(ProtocolError::LoginMissingSessionId {
            action: action.clone(),
        });
    }
    let Some(session_id) = session_id.and_then(Value::as_str) else {
        return Err(ProtocolError::LoginNonStringSessionId {
            action: action.clone(),
        });
    };

    Ok(LoginParams::new(role, session_id))
}

/// Absent, `null`, `false`, `0` and `""` all count as "no value".
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}
