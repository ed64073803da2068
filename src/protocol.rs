//! Wire-level action envelope exchanged with app and tester clients.
//!
//! Every frame is a JSON object with a `type` string, an optional `params`
//! value, and any number of extra fields (`messageId` and friends) that the
//! broker carries through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

pub const LOGIN: &str = "login";
pub const LOGIN_SUCCESS: &str = "loginSuccess";
pub const SERVER_ERROR: &str = "serverError";
pub const APP_CONNECTED: &str = "appConnected";
pub const APP_DISCONNECTED: &str = "appDisconnected";

/// A single protocol message.
///
/// Everything except `type` stays in `extra` exactly as received, `params`
/// included, so a relayed action reaches the peer unchanged (an explicit
/// `"params": null` survives).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            extra: Map::new(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.extra.insert("params".into(), params);
        self
    }

    /// The `params` field as sent, `Some(Value::Null)` for an explicit null.
    pub fn params(&self) -> Option<&Value> {
        self.extra.get("params")
    }

    /// Client-chosen correlation id, if the action carries one.
    pub fn message_id(&self) -> Option<&Value> {
        self.extra.get("messageId")
    }

    /// Copy of this action with only the `type` replaced.
    pub fn renamed(&self, kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            ..self.clone()
        }
    }

    /// Build the `serverError` reply for a rejected action.
    ///
    /// The offending action's `messageId` is echoed so the client can match
    /// the error to its request.
    pub fn server_error(err: &ProtocolError) -> Self {
        let mut error = Map::new();
        error.insert("code".into(), Value::from(err.code()));
        error.insert("message".into(), Value::from(err.to_string()));
        if let Some(hint) = err.hint() {
            error.insert("hint".into(), Value::from(hint));
        }
        if let Some(action) = err.action() {
            if let Ok(debug_info) = serde_json::to_value(action) {
                error.insert("debugInfo".into(), debug_info);
            }
        }

        let mut reply = Action::new(SERVER_ERROR)
            .with_params(serde_json::json!({ "error": Value::Object(error) }));
        if let Some(id) = err.action().and_then(Action::message_id) {
            reply.extra.insert("messageId".into(), id.clone());
        }
        reply
    }
}

/// Which side of a session a connection fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    App,
    Tester,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::App => "app",
            Role::Tester => "tester",
        }
    }

    /// Parse the exact wire spelling; anything else is rejected.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "app" => Some(Role::App),
            "tester" => Some(Role::Tester),
            _ => None,
        }
    }

    /// The role a connection in this role is paired with.
    pub fn peer(self) -> Self {
        match self {
            Role::App => Role::Tester,
            Role::Tester => Role::App,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated contents of a `login` action's params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginParams {
    pub role: Role,
    pub session_id: String,
}

impl LoginParams {
    pub fn new(role: Role, session_id: impl Into<String>) -> Self {
        Self {
            role,
            session_id: session_id.into(),
        }
    }
}
