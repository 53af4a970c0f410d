//! Bus configuration.
//!
//! Service hosts pass their settings as a flat string map; [`BusConfig::from_properties`]
//! reads the keys below and leaves anything absent at its default.
//!
//! | key | default |
//! |---|---|
//! | `push_serverbindaddress` | `tcp://localhost:49853` |
//! | `push_clientbindaddress` | `tcp://localhost:48944` |
//! | `push_clientid` | `1` |
//! | `chainid` | `0` |
//! | `push_requestttl_ms` | `15000` |
//! | `push_heartbeat_ms` | `5000` |

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::correlation::{DEFAULT_SWEEP_DEPTH, DEFAULT_TTL};
use crate::error::ConfigError;

pub const DEFAULT_SERVER_ADDRESS: &str = "tcp://localhost:49853";
pub const DEFAULT_CLIENT_BIND_ADDRESS: &str = "tcp://localhost:48944";
pub const DEFAULT_SENDER_ID: i32 = 1;
pub const DEFAULT_CHANNEL_ID: i32 = 0;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

pub const KEY_SERVER_ADDRESS: &str = "push_serverbindaddress";
pub const KEY_CLIENT_BIND_ADDRESS: &str = "push_clientbindaddress";
pub const KEY_SENDER_ID: &str = "push_clientid";
pub const KEY_CHANNEL_ID: &str = "chainid";
pub const KEY_REQUEST_TTL_MS: &str = "push_requestttl_ms";
pub const KEY_HEARTBEAT_MS: &str = "push_heartbeat_ms";

/// Settings for one [`PushBus`](crate::PushBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Routing key this bus registers on and stamps on outgoing envelopes
    pub channel_id: i32,
    /// Distinguishes buses sharing a channel
    pub sender_id: i32,
    /// Where outgoing envelopes are sent
    pub server_address: String,
    /// Where incoming envelopes are received
    pub client_bind_address: String,
    /// Lifetime of pending requests and queries
    pub request_ttl: Duration,
    /// Expired entries swept per insertion
    pub sweep_depth: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_initial_delay: Duration,
    pub heartbeat_enabled: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID,
            sender_id: DEFAULT_SENDER_ID,
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            client_bind_address: DEFAULT_CLIENT_BIND_ADDRESS.to_string(),
            request_ttl: DEFAULT_TTL,
            sweep_depth: DEFAULT_SWEEP_DEPTH,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_initial_delay: DEFAULT_HEARTBEAT_INTERVAL / 2,
            heartbeat_enabled: true,
        }
    }
}

impl BusConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from a property map. Unknown keys are ignored.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(address) = properties.get(KEY_SERVER_ADDRESS) {
            config.server_address = address.trim().to_string();
        }
        if let Some(address) = properties.get(KEY_CLIENT_BIND_ADDRESS) {
            config.client_bind_address = address.trim().to_string();
        }
        if let Some(sender_id) = parse_property(properties, KEY_SENDER_ID)? {
            config.sender_id = sender_id;
        }
        if let Some(channel_id) = parse_property(properties, KEY_CHANNEL_ID)? {
            config.channel_id = channel_id;
        }
        if let Some(ms) = parse_property(properties, KEY_REQUEST_TTL_MS)? {
            config.request_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_property(properties, KEY_HEARTBEAT_MS)? {
            config = config.with_heartbeat_interval(Duration::from_millis(ms));
        }

        Ok(config)
    }

    pub fn with_channel_id(mut self, channel_id: i32) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn with_sender_id(mut self, sender_id: i32) -> Self {
        self.sender_id = sender_id;
        self
    }

    pub fn with_server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = address.into();
        self
    }

    pub fn with_client_bind_address(mut self, address: impl Into<String>) -> Self {
        self.client_bind_address = address.into();
        self
    }

    pub fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.request_ttl = ttl;
        self
    }

    pub fn with_sweep_depth(mut self, depth: usize) -> Self {
        self.sweep_depth = depth;
        self
    }

    /// Set the ping interval. The initial delay becomes half of it.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_initial_delay = interval / 2;
        self
    }

    pub fn with_heartbeat_initial_delay(mut self, delay: Duration) -> Self {
        self.heartbeat_initial_delay = delay;
        self
    }

    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Empty("server_address"));
        }
        if self.client_bind_address.trim().is_empty() {
            return Err(ConfigError::Empty("client_bind_address"));
        }
        if self.request_ttl.is_zero() {
            return Err(ConfigError::Zero("request_ttl"));
        }
        if self.sweep_depth == 0 {
            return Err(ConfigError::Zero("sweep_depth"));
        }
        if self.heartbeat_enabled && self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Zero("heartbeat_interval"));
        }
        Ok(())
    }
}

fn parse_property<T: FromStr>(
    properties: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = properties.get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        })
}
