//! Registry pairing connections into sessions.
//!
//! The [`SessionManager`] keeps three maps:
//!
//! - connection id → [`Connection`] (every live socket),
//! - connection id → session id (which session a connection belongs to),
//! - session id → [`Session`] (live sessions only).
//!
//! A session is created by the first login that names it and removed as soon
//! as both of its role slots are empty again.
//!
//! Every public method takes the registry lock once and holds it for its whole
//! run, so each operation completes before the next one observes the maps.
//! The lock is never held across an await point.
//!
//! Misuse of the registry by trusted callers (double registration, unknown
//! connections) is an [`InvariantViolation`]. Violations are logged and
//! counted, and the offending call becomes a no-op; they are never propagated,
//! so a single confused socket cannot take down the broker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::{Connection, ConnectionId, Transport};
use crate::protocol::LoginParams;
use crate::session::Session;

/// Registry API misuse that correct callers can never trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("cannot register the same connection twice: {0}")]
    ConnectionAlreadyRegistered(ConnectionId),
    #[error("cannot register {connection} in session {requested}, it already belongs to session {current}")]
    ConnectionAlreadyInSession {
        connection: ConnectionId,
        current: String,
        requested: String,
    },
    #[error("cannot unregister an unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

#[derive(Default)]
struct ManagerInner {
    connections: HashMap<ConnectionId, Connection>,
    sessions_by_connection: HashMap<ConnectionId, String>,
    sessions: HashMap<String, Session>,
    violations: u64,
}

impl ManagerInner {
    fn report(&mut self, violation: InvariantViolation) {
        self.violations += 1;
        tracing::error!(
            %violation,
            total = self.violations,
            "session registry invariant violated, ignoring call"
        );
    }

    fn register_connection(
        &mut self,
        id: ConnectionId,
        transport: Transport,
    ) -> Result<Connection, InvariantViolation> {
        if self.connections.contains_key(&id) {
            return Err(InvariantViolation::ConnectionAlreadyRegistered(id));
        }
        let connection = Connection::new(id, transport);
        self.connections.insert(id, connection.clone());
        Ok(connection)
    }

    fn register_session(
        &mut self,
        connection: ConnectionId,
        params: &LoginParams,
    ) -> Result<Session, InvariantViolation> {
        if let Some(current) = self.sessions_by_connection.get(&connection) {
            return Err(InvariantViolation::ConnectionAlreadyInSession {
                connection,
                current: current.clone(),
                requested: params.session_id.clone(),
            });
        }

        let LoginParams { role, session_id } = params;
        let event = if self.sessions.contains_key(session_id) {
            "SESSION_JOINED"
        } else {
            "SESSION_CREATED"
        };
        tracing::debug!(event, %session_id, %role, %connection, "session login");
        let session = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| Session::new(session_id.clone()));

        if let Some(displaced) = session.set_connection(*role, connection) {
            tracing::warn!(
                %session_id,
                %role,
                %displaced,
                replacement = %connection,
                "role slot taken over, previous occupant unpaired"
            );
            self.sessions_by_connection.remove(&displaced);
        }
        let snapshot = session.clone();
        self.sessions_by_connection
            .insert(connection, session_id.clone());
        Ok(snapshot)
    }

    fn unregister_connection(&mut self, id: ConnectionId) -> Result<(), InvariantViolation> {
        if !self.connections.contains_key(&id) {
            return Err(InvariantViolation::UnknownConnection(id));
        }

        if let Some(session_id) = self.sessions_by_connection.remove(&id) {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.disconnect(id);
                if session.is_empty() {
                    self.sessions.remove(&session_id);
                    tracing::debug!(event = "SESSION_DESTROYED", %session_id, connection = %id, "session emptied");
                }
            }
        }

        self.connections.remove(&id);
        Ok(())
    }
}

/// Process-wide registry of connections and sessions.
///
/// Cheap to clone; all clones share the same maps.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<Mutex<ManagerInner>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted socket in the anonymous state.
    ///
    /// Returns `None` (and reports a violation) if `id` is already
    /// registered; the existing connection is left untouched.
    pub fn register_connection(&self, id: ConnectionId, transport: Transport) -> Option<Connection> {
        let mut inner = self.inner.lock();
        match inner.register_connection(id, transport) {
            Ok(connection) => {
                tracing::debug!(connection = %id, peer = ?connection.peer_addr(), "connection registered");
                Some(connection)
            }
            Err(violation) => {
                inner.report(violation);
                None
            }
        }
    }

    /// Put `connection` into the `params.role` slot of session
    /// `params.session_id`, creating the session on first use.
    ///
    /// Any previous occupant of that slot is unpaired. Returns a snapshot of
    /// the session, or `None` (and reports a violation) if the connection
    /// already belongs to a session.
    pub fn register_session(&self, connection: ConnectionId, params: &LoginParams) -> Option<Session> {
        let mut inner = self.inner.lock();
        match inner.register_session(connection, params) {
            Ok(session) => Some(session),
            Err(violation) => {
                inner.report(violation);
                None
            }
        }
    }

    /// Session `connection` currently belongs to.
    pub fn get_session(&self, connection: ConnectionId) -> Option<Session> {
        let inner = self.inner.lock();
        inner
            .sessions_by_connection
            .get(&connection)
            .and_then(|session_id| inner.sessions.get(session_id))
            .cloned()
    }

    /// Forget a closed socket, unpairing it from its session first.
    ///
    /// The session is dropped once neither role is occupied. Returns `false`
    /// (and reports a violation) if the connection is not registered.
    pub fn unregister_connection(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        match inner.unregister_connection(id) {
            Ok(()) => {
                tracing::debug!(connection = %id, "connection unregistered");
                true
            }
            Err(violation) => {
                inner.report(violation);
                false
            }
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.inner.lock().connections.get(&id).cloned()
    }

    /// Look up a live session by its identifier.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    /// The connection paired with `connection` in its session, if both are
    /// present.
    pub fn peer_of(&self, connection: ConnectionId) -> Option<Connection> {
        let inner = self.inner.lock();
        let session = inner
            .sessions_by_connection
            .get(&connection)
            .and_then(|session_id| inner.sessions.get(session_id))?;
        let role = session.role_of(connection)?;
        let peer = session.connection(role.peer())?;
        inner.connections.get(&peer).cloned()
    }

    /// All live sessions, ordered by identifier.
    pub fn list_sessions(&self) -> Vec<Session> {
        let inner = self.inner.lock();
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Number of invariant violations reported since startup.
    pub fn invariant_violations(&self) -> u64 {
        self.inner.lock().violations
    }
}
