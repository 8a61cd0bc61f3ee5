//! Configuration handling for the control client.
//!
//! Settings come from three layers, later ones winning: the YAML config
//! file, `XPN_*` environment variables, then command-line flags.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use xpn_wire::ConnectionSettings;

/// Control client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Engine host name or address
    pub host: String,
    /// Engine WebSocket port
    pub port: u16,
    /// Login user name
    pub username: String,
    /// Login password
    pub password: String,
    /// Default log level
    pub log_level: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            username: String::new(),
            password: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl ControlConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            match serde_yaml::from_str::<ControlConfig>(&content) {
                Ok(loaded) => {
                    config = loaded;
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(err) => {
                    warn!(
                        "Failed to parse config file {:?}: {}; using defaults",
                        config_path.as_ref(),
                        err
                    );
                }
            }
        } else {
            warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            );
        }

        config.apply_environment_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        if let Ok(host) = std::env::var("XPN_HOST") {
            info!("Host overridden by environment: {}", host);
            self.host = host;
        }

        if let Ok(port) = std::env::var("XPN_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                info!("Port overridden by environment: {}", port);
                self.port = port;
            } else {
                warn!("Ignoring unparseable XPN_PORT value: {}", port);
            }
        }

        if let Ok(username) = std::env::var("XPN_USERNAME") {
            info!("Username overridden by environment: {}", username);
            self.username = username;
        }

        if let Ok(password) = std::env::var("XPN_PASSWORD") {
            info!("Password overridden by environment");
            self.password = password;
        }
    }

    /// Connection settings derived from this configuration
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
