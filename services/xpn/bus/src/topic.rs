//! Named topics routed by the event bus.

use xpn_wire::{CommandKind, CorrelationId};

/// Every topic the bus routes.
///
/// The `Conn*` topics are consumed by the core on behalf of external
/// collaborators; the `Network*`/`Session*` topics (plus the keyed reply
/// topics) are what those collaborators subscribe to in return. The
/// `Socket*` topics are internal to the core: raw transport events on
/// their way to the session controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Ask the controller to connect
    ConnConnect,
    /// Ask the controller to disconnect
    ConnDisconnect,
    /// Ask the controller to drop and re-establish the session
    ConnReconnect,
    /// Hand a serialized envelope to the controller's send path
    ConnSendMessage,
    /// Replace the connection settings wholesale
    ConnUpdateSettings,
    /// Ask for an immediate status republish
    ConnGetStatus,
    /// Status snapshot republished on request and on every transition
    ConnStatus,

    /// Transport: socket opened
    SocketOpened,
    /// Transport: raw inbound text frame
    SocketMessage,
    /// Transport: socket closed (with optional retry schedule)
    SocketClosed,
    /// Transport: socket-level failure
    SocketError,

    /// Session: connection attempt started
    NetworkConnecting,
    /// Session: remote process reachable (pre-login)
    NetworkConnected,
    /// Session: connection lost
    NetworkDisconnected,
    /// Session: evolving user-facing status line
    NetworkConnectionMsg,

    /// Session: login acknowledged
    SessionAuthenticated,
    /// Session: server-reported error
    SessionError,
    /// Remote controller's main engine reported started
    ControllerStarted,

    /// Outbound command of one kind, consumed by the encoder
    Command(CommandKind),
    /// Replies concerning one take item
    TakeItem(i64),
    /// Replies concerning one widget
    Widget(String),
    /// Reply carrying one correlation token
    Reply(CorrelationId),
    /// Verbatim payload of an unrecognized service
    Service(String),
}
