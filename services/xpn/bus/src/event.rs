//! Payloads carried by bus events.

use std::time::Duration;
use xpn_wire::{Command, ConnectionSettings, Reply, StatusReport};

/// Payload of a published event.
///
/// Which variant a topic carries is fixed by convention (see [`crate::Topic`]);
/// handlers match on the variant they expect and ignore anything else.
#[derive(Debug, Clone)]
pub enum Event {
    /// Parameterless trigger (`conn.connect`, `conn.getStatus`, ...)
    Trigger,
    /// New connection settings
    Settings(ConnectionSettings),
    /// A text frame, raw inbound or serialized outbound
    Message(String),
    /// Socket opened
    Opened,
    /// Socket closed
    Closed {
        /// Close reason reported by the peer or the watchdog
        reason: String,
        /// Delay until the scheduled reconnect, if one was scheduled
        retry_in: Option<Duration>,
    },
    /// Socket-level failure description
    SocketError(String),
    /// Outbound command for the encoder
    Command(Command),
    /// Correlated reply from the remote controller
    Reply(Reply),
    /// Status snapshot
    Status(StatusReport),
    /// Human-readable status line
    StatusMessage(String),
    /// Verbatim `data` payload of an unrecognized service
    Raw(serde_json::Value),
}

impl Event {
    /// The message text, when this event carries one
    pub fn as_message(&self) -> Option<&str> {
        match self {
            Event::Message(text) | Event::StatusMessage(text) => Some(text),
            _ => None,
        }
    }

    /// The reply payload, when this event carries one
    pub fn as_reply(&self) -> Option<&Reply> {
        match self {
            Event::Reply(reply) => Some(reply),
            _ => None,
        }
    }
}
