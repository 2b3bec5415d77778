//! Client configuration
//!
//! Loaded from a TOML file; every field has a default so a file only needs
//! the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::engine::EngineSettings;
use crate::error::ConfigError;

/// Default signaling endpoint
pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:3000/signal";

/// Default STUN servers
pub const DEFAULT_ICE_SERVERS: &[&str] = &["stun:stun.l.google.com:19302"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_signaling_url")]
    pub signaling_url: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
    /// Fail sessions that have not connected after this long; 0 disables
    #[serde(default = "default_negotiation_timeout_ms")]
    pub negotiation_timeout_ms: u64,
    #[serde(default = "default_timeout_check_interval_ms")]
    pub timeout_check_interval_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: default_signaling_url(),
            room_id: String::new(),
            ice_servers: default_ice_servers(),
            negotiation_timeout_ms: default_negotiation_timeout_ms(),
            timeout_check_interval_ms: default_timeout_check_interval_ms(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn negotiation_timeout(&self) -> Option<Duration> {
        match self.negotiation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms.max(1))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            ice_servers: self.ice_servers.clone(),
        }
    }
}

fn default_signaling_url() -> String {
    DEFAULT_SIGNALING_URL.to_string()
}

fn default_ice_servers() -> Vec<String> {
    DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect()
}

fn default_negotiation_timeout_ms() -> u64 {
    30_000
}

fn default_timeout_check_interval_ms() -> u64 {
    1_000
}

/// Reconnection to the signaling server with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (starting at 1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

fn default_true() -> bool {
    true
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}
