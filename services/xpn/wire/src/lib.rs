//! Envelope framing, command catalog, and correlation ids for the XPression
//! control protocol.
//!
//! This crate provides the wire-level types shared by every other crate:
//! the JSON message envelope (both directions), the catalog of outbound
//! commands, correlation-id generation and the connection settings/state
//! types that describe a client session.
//!
//! ## Wire Format
//!
//! ```text
//! { "service": string,
//!   "data": { "category"?: string,
//!             "action"?:   string,
//!             "type"?:     string,
//!             "message"?:  string,
//!             "properties" | "value": object } }
//! ```
//!
//! Every outbound request that expects a reply carries a `properties.uuid`
//! correlation token; the controller echoes it back in `value.uuid`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod settings;

// Re-export main types
pub use command::{Command, CommandKind};
pub use correlation::CorrelationId;
pub use envelope::{decode, Envelope, EnvelopeData, InboundData, InboundEnvelope, Reply, ReplyValue};
pub use error::WireError;
pub use settings::{ConnectionSettings, ConnectionState, StatusReport};
