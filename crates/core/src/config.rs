use crate::types::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port the NuBot UI server always binds to.
pub const DEFAULT_SERVER_PORT: u16 = 4567;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL of the bot control server, without trailing slash.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Client-side request throttle. The server applies its own limits.
    pub requests_per_second: u32,
    /// Path segment serving open orders. Older servers expose `info`.
    pub orders_endpoint: String,
}

/// Poll cadence per endpoint, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    pub status_ms: u64,
    pub orders_ms: u64,
    pub balances_ms: u64,
    pub log_ms: u64,
    pub config_file_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    pub message_capacity: usize,
    pub tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            ui: UiConfig {
                message_capacity: 10,
                tick_ms: 100,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://localhost:{DEFAULT_SERVER_PORT}"),
            timeout_secs: 10,
            requests_per_second: 30,
            orders_endpoint: "orders".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_ms: 2_000,
            // The server caps order/balance refreshes anyway
            orders_ms: 4_000,
            balances_ms: 4_000,
            log_ms: 150,
            config_file_ms: 5_000,
        }
    }
}

impl PollingConfig {
    /// Delay between two polls of `endpoint`.
    #[must_use]
    pub const fn interval(&self, endpoint: Endpoint) -> Duration {
        let ms = match endpoint {
            Endpoint::Status => self.status_ms,
            Endpoint::Orders => self.orders_ms,
            Endpoint::Balances => self.balances_ms,
            Endpoint::Log => self.log_ms,
            Endpoint::ConfigFile => self.config_file_ms,
        };
        Duration::from_millis(ms)
    }

    /// Delay before the very first poll of `endpoint`.
    ///
    /// Balances start half an interval late so they do not hit the server in
    /// the same tick as orders.
    #[must_use]
    pub const fn initial_delay(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Balances => Duration::from_millis(self.balances_ms / 2),
            _ => Duration::ZERO,
        }
    }
}
