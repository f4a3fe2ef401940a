//! Relay configuration.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "webdrop";
const APP_NAME: &str = "webdrop_relay";
const CONFIG_FILE: &str = "relay.json";

/// Env override for the bind address; takes precedence over the config file.
pub const ADDR_ENV: &str = "WEBDROP_RELAY_ADDR";

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

impl RelayConfig {
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from the env override, then the config file, then defaults.
    pub fn load() -> Self {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            match addr.parse() {
                Ok(bind_addr) => return Self { bind_addr },
                Err(_) => tracing::warn!(%addr, "ignoring unparsable {}", ADDR_ENV),
            }
        }

        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist to the config file, creating the directory if needed.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:9999".parse().unwrap(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bind_addr, config.bind_addr);
    }

    #[test]
    fn garbage_config_falls_back_to_default() {
        let parsed: RelayConfig =
            serde_json::from_str("{\"bind_addr\":\"not an addr\"}").unwrap_or_default();
        assert_eq!(parsed.bind_addr, RelayConfig::default().bind_addr);
    }
}
