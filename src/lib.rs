//! pairbroker - pairs test runners with the apps they drive.
//!
//! A *tester* (test runner) and an *app* (device under test) each open a
//! WebSocket to the broker and log in with a shared session id. The broker
//! pairs the two sockets into one session and relays actions between them.
//!
//! The core lives in [`manager`] (the registry), [`session`], [`connection`]
//! and [`handler`] (the login state machine). [`api`] is the axum transport
//! that feeds it.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod manager;
pub mod protocol;
pub mod session;
pub mod shutdown;

pub use connection::{Connection, ConnectionId, Transport};
pub use error::ProtocolError;
pub use manager::{InvariantViolation, SessionManager};
pub use protocol::{Action, LoginParams, Role};
pub use session::Session;
