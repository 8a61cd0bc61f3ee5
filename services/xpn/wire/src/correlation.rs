//! Correlation ids for matching asynchronous replies to their requests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token embedded in a request and echoed in its reply.
///
/// Generated fresh for every request that expects an answer; the remote
/// controller copies it verbatim into `value.uuid` so replies can be routed
/// back to the caller that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random correlation id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// View the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serializes_as_bare_string() {
        let id = CorrelationId::from("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");

        let back: CorrelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
