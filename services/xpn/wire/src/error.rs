//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Payload is not valid JSON
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope carries no `service` field
    #[error("missing service field")]
    MissingService,
}
