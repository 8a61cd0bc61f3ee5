//! Session layer of the XPression control client.
//!
//! Three components, all coupled only through the event bus:
//!
//! - [`SocketTransport`]: owns the WebSocket, reconnects with capped
//!   exponential backoff, publishes raw socket events.
//! - [`SessionController`]: the connection state machine. Logs in on
//!   open, decodes and dispatches inbound envelopes, correlates replies
//!   with pending requests, tears sessions down gracefully.
//! - [`CommandEncoder`]: serializes command events into wire envelopes
//!   and republishes them for the controller to send.
//!
//! ```text
//!   caller ──Command topic──▶ CommandEncoder ──conn.sendMessage──▶
//!   SessionController ──send──▶ SocketTransport ══socket══▶ engine
//!
//!   engine ══socket══▶ SocketTransport ──socket.message──▶
//!   SessionController ──Reply(uuid) / TakeItem(id) / Widget(name)──▶ caller
//! ```

#![warn(clippy::all)]

pub mod commands;
pub mod controller;
pub mod pending;
pub mod transport;

pub use commands::CommandEncoder;
pub use controller::{RequestDropped, SessionConfig, SessionController};
pub use pending::PendingRequests;
pub use transport::{SocketTransport, TransportConfig};
