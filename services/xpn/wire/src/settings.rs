//! Connection settings and session state shared across crates.

use serde::{Deserialize, Serialize};

/// Network settings for reaching the remote controller.
///
/// Owned by the session controller and replaced wholesale whenever the
/// external settings store changes; the transport never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Controller hostname or IP address
    pub host: String,
    /// Controller WebSocket port
    pub port: u16,
    /// Login user name
    pub username: String,
    /// Login password
    pub password: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl ConnectionSettings {
    /// WebSocket URL for these settings
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Connection/session state machine values.
///
/// Transitions only ever follow Disconnected -> Connecting -> Connected ->
/// Authenticated -> Disconnected; Authenticated is only reachable from
/// Connected (a successful login over an already-open socket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No socket, no session
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Socket open, login not yet acknowledged
    Connected,
    /// Login acknowledged by the controller
    Authenticated,
}

impl ConnectionState {
    /// Whether the socket is open (messages can be transmitted)
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }
}

/// Snapshot of the session controller's user-visible status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Current state machine value
    pub state: ConnectionState,
    /// Human-readable status line for the UI
    pub message: String,
    /// Whether the transport will retry after a close
    pub auto_reconnect: bool,
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            message: "Not connected.".to_string(),
            auto_reconnect: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_formatting() {
        let settings = ConnectionSettings {
            host: "10.0.0.5".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(settings.url(), "ws://10.0.0.5:8080");
    }

    #[test]
    fn test_open_states() {
        assert!(!ConnectionState::Disconnected.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(ConnectionState::Connected.is_open());
        assert!(ConnectionState::Authenticated.is_open());
    }
}
