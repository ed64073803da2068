use crate::connection::ConnectionId;
use crate::protocol::{Action, Role};

/// Attached to errors a conforming client can never trigger.
pub const REPORT_ISSUE: &str = "This should not happen with a conforming client. \
     Please report it as a bug and attach the debugInfo of this error.";

/// Errors caused by a remote peer sending a malformed or out-of-order action.
///
/// These are surfaced to the transport layer, which reports them back to the
/// peer. Registry misuse by trusted callers is a different category, see
/// [`crate::manager::InvariantViolation`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid login action received, it has no .params")]
    LoginMissingParams { action: Action },
    #[error("invalid login action received, it has invalid .role")]
    LoginInvalidRole { action: Action },
    #[error("invalid login action received, it has no .sessionId")]
    LoginMissingSessionId { action: Action },
    #[error("invalid login action received, it has a non-string .sessionId")]
    LoginNonStringSessionId { action: Action },
    #[error("action dispatched too early, there is no session to use: {}", .action.kind)]
    DispatchedTooEarly { action: Action },
    #[error("cannot log in, connection {connection} already belongs to a session")]
    AlreadyInSession {
        connection: ConnectionId,
        action: Action,
    },
    /// Also raised for a connection whose slot was taken over by a newer login.
    #[error("cannot forward {} in session {session_id}, no {role} is paired with this connection", .action.kind)]
    PeerNotConnected {
        role: Role,
        session_id: String,
        action: Action,
    },
    #[error("cannot forward {} in session {session_id}, the {role} is not accepting actions", .action.kind)]
    PeerBacklogged {
        role: Role,
        session_id: String,
        action: Action,
    },
    #[error("malformed action: {0}")]
    MalformedAction(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Machine-readable error code sent to the peer.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::LoginMissingParams { .. } => "login_missing_params",
            ProtocolError::LoginInvalidRole { .. } => "login_invalid_role",
            ProtocolError::LoginMissingSessionId { .. } => "login_missing_session_id",
            ProtocolError::LoginNonStringSessionId { .. } => "login_non_string_session_id",
            ProtocolError::DispatchedTooEarly { .. } => "dispatched_too_early",
            ProtocolError::AlreadyInSession { .. } => "already_in_session",
            ProtocolError::PeerNotConnected { .. } => "peer_not_connected",
            ProtocolError::PeerBacklogged { .. } => "peer_backlogged",
            ProtocolError::MalformedAction(_) => "malformed_action",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ProtocolError::LoginMissingParams { .. }
            | ProtocolError::LoginInvalidRole { .. }
            | ProtocolError::LoginMissingSessionId { .. }
            | ProtocolError::LoginNonStringSessionId { .. }
            | ProtocolError::DispatchedTooEarly { .. }
            | ProtocolError::AlreadyInSession { .. } => Some(REPORT_ISSUE),
            ProtocolError::PeerNotConnected { .. }
            | ProtocolError::PeerBacklogged { .. }
            | ProtocolError::MalformedAction(_) => None,
        }
    }

    /// The offending action, kept as debug context.
    pub fn action(&self) -> Option<&Action> {
        match self {
            ProtocolError::LoginMissingParams { action }
            | ProtocolError::LoginInvalidRole { action }
            | ProtocolError::LoginMissingSessionId { action }
            | ProtocolError::LoginNonStringSessionId { action }
            | ProtocolError::DispatchedTooEarly { action }
            | ProtocolError::AlreadyInSession { action, .. }
            | ProtocolError::PeerNotConnected { action, .. }
            | ProtocolError::PeerBacklogged { action, .. } => Some(action),
            ProtocolError::MalformedAction(_) => None,
        }
    }
}
