use serde::Serialize;

use crate::connection::ConnectionId;
use crate::protocol::Role;

/// Pairing of at most one app connection and one tester connection under a
/// shared, caller-supplied identifier.
///
/// Slots hold connection ids only; the transport layer owns the connections
/// themselves. Slots are written exclusively by the
/// [`SessionManager`](crate::manager::SessionManager), so handlers only ever
/// see snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    id: String,
    app: Option<ConnectionId>,
    tester: Option<ConnectionId>,
}

impl Session {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app: None,
            tester: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn app(&self) -> Option<ConnectionId> {
        self.app
    }

    pub fn tester(&self) -> Option<ConnectionId> {
        self.tester
    }

    /// Connection occupying the slot for `role`.
    pub fn connection(&self, role: Role) -> Option<ConnectionId> {
        match role {
            Role::App => self.app,
            Role::Tester => self.tester,
        }
    }

    /// Role slot currently held by `connection`, if any.
    pub fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        if self.app == Some(connection) {
            Some(Role::App)
        } else if self.tester == Some(connection) {
            Some(Role::Tester)
        } else {
            None
        }
    }

    /// True when neither slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.app.is_none() && self.tester.is_none()
    }

    /// Put `connection` into the `role` slot, returning the previous occupant.
    pub(crate) fn set_connection(
        &mut self,
        role: Role,
        connection: ConnectionId,
    ) -> Option<ConnectionId> {
        match role {
            Role::App => self.app.replace(connection),
            Role::Tester => self.tester.replace(connection),
        }
    }

    /// Clear whichever slot holds `connection`.
    pub(crate) fn disconnect(&mut self, connection: ConnectionId) -> Option<Role> {
        let role = self.role_of(connection)?;
        match role {
            Role::App => self.app = None,
            Role::Tester => self.tester = None,
        }
        Some(role)
    }
}
