use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::handler::{ConnectionHandler, HandlerContext};
use crate::manager::SessionManager;
use crate::protocol::{Action, Role};

/// Identity of one accepted transport endpoint.
///
/// Compared by identity: two sockets from the same peer address still get
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a process-unique id for a freshly accepted socket.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to the raw socket behind a connection.
///
/// The socket task owns the receiving half of `outbound` and writes whatever
/// arrives to the wire.
#[derive(Debug, Clone)]
pub struct Transport {
    peer: Option<SocketAddr>,
    outbound: mpsc::Sender<Action>,
}

impl Transport {
    pub fn new(peer: Option<SocketAddr>, outbound: mpsc::Sender<Action>) -> Self {
        Self { peer, outbound }
    }

    /// Create a transport together with the receiver its socket task drains.
    pub fn channel(peer: Option<SocketAddr>, capacity: usize) -> (Self, mpsc::Receiver<Action>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(peer, tx), rx)
    }
}

/// One live transport endpoint known to the [`SessionManager`].
///
/// Cheap to clone; clones share the active handler.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    transport: Transport,
    handler: Arc<Mutex<ConnectionHandler>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.transport.peer)
            .field("handler", &self.handler.lock().name())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// New connections always start out anonymous.
    pub(crate) fn new(id: ConnectionId, transport: Transport) -> Self {
        Self {
            id,
            transport,
            handler: Arc::new(Mutex::new(ConnectionHandler::anonymous())),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.transport.peer
    }

    /// Snapshot of the active handler.
    pub fn handler(&self) -> ConnectionHandler {
        self.handler.lock().clone()
    }

    /// Role the connection logged in with, `None` while anonymous.
    pub fn role(&self) -> Option<Role> {
        self.handler.lock().role()
    }

    pub(crate) fn set_handler(&self, handler: ConnectionHandler) {
        let mut current = self.handler.lock();
        tracing::debug!(
            connection = %self.id,
            from = current.name(),
            to = handler.name(),
            "handler transition"
        );
        *current = handler;
    }

    /// Queue an action for delivery to this connection's peer.
    ///
    /// Never blocks. Hands the action back if the socket is gone or its
    /// outbound buffer is full.
    pub fn send_action(&self, action: Action) -> Result<(), Action> {
        match self.transport.outbound.try_send(action) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(action)) => {
                tracing::warn!(
                    connection = %self.id,
                    kind = %action.kind,
                    "outbound buffer full, dropping action"
                );
                Err(action)
            }
            Err(mpsc::error::TrySendError::Closed(action)) => {
                tracing::debug!(connection = %self.id, "outbound channel closed");
                Err(action)
            }
        }
    }

    /// Hand an inbound action to the active handler.
    ///
    /// The handler is cloned out before it runs, so it may replace itself
    /// through [`Connection::set_handler`].
    pub fn dispatch(&self, manager: &SessionManager, action: Action) -> Result<(), ProtocolError> {
        let handler = self.handler();
        handler.handle(&HandlerContext::new(manager, self), action)
    }

    /// Notify the active handler that the socket went away.
    ///
    /// Must be called exactly once per registered connection.
    pub fn close(&self, manager: &SessionManager) {
        let handler = self.handler();
        handler.on_close(&HandlerContext::new(manager, self));
    }
}
