//! Configuration file schema for the DREAM CSC
//!
//! The `*Json` structures mirror the file. `to_dream_config` validates them and
//! produces the typed `DreamConfig` used at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{ServerAddress, ServerId};

/// Longest acknowledgement wait the DREAM interface allows
pub const ACK_TIMEOUT_MAX_MS: u64 = 2000;
pub const TELEMETRY_INTERVAL_MIN_MS: u64 = 1000;
pub const TELEMETRY_INTERVAL_MAX_MS: u64 = 5000;

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_ack_timeout_ms() -> u64 {
    ACK_TIMEOUT_MAX_MS
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_init_ms() -> u64 {
    100
}

fn default_reconnect_delay_max_ms() -> u64 {
    10_000
}

fn default_telemetry_interval_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamConfigJson {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub servers: Vec<ServerAddress>,
    #[serde(default)]
    pub connection: ConnectionConfigJson,
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,
    #[serde(default)]
    pub weather: WeatherConfigJson,
    #[serde(default)]
    pub data_products: DataProductConfigJson,
    #[serde(default)]
    pub simulation_mode: bool,
}

/// JSON representation of the connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfigJson {
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_delay_init_ms")]
    pub reconnect_delay_init_ms: u64,
    #[serde(default = "default_reconnect_delay_max_ms")]
    pub reconnect_delay_max_ms: u64,
    /// 0 retries forever
    #[serde(default)]
    pub reconnect_max_retries: u32,
}

impl Default for ConnectionConfigJson {
    fn default() -> Self {
        Self {
            connection_timeout_ms: default_connection_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            auto_reconnect: true,
            reconnect_delay_init_ms: default_reconnect_delay_init_ms(),
            reconnect_delay_max_ms: default_reconnect_delay_max_ms(),
            reconnect_max_retries: 0,
        }
    }
}

/// JSON representation of the weather relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfigJson {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// File holding the latest weather as JSON; absent means no weather relay
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for WeatherConfigJson {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            file: None,
        }
    }
}

/// JSON representation of the data product settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProductConfigJson {
    #[serde(default = "default_true")]
    pub skip_tmpdata_products: bool,
}

impl Default for DataProductConfigJson {
    fn default() -> Self {
        Self {
            skip_tmpdata_products: true,
        }
    }
}

/// Connection settings shared by every server connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub connection_timeout: Duration,
    pub ack_timeout: Duration,
    pub auto_reconnect: bool,
    pub reconnect_delay_init: Duration,
    pub reconnect_delay_max: Duration,
    pub reconnect_max_retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_millis(default_connection_timeout_ms()),
            ack_timeout: Duration::from_millis(default_ack_timeout_ms()),
            auto_reconnect: true,
            reconnect_delay_init: Duration::from_millis(default_reconnect_delay_init_ms()),
            reconnect_delay_max: Duration::from_millis(default_reconnect_delay_max_ms()),
            reconnect_max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherConfig {
    pub poll_interval: Duration,
    pub file: Option<PathBuf>,
}

/// Validated CSC configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DreamConfig {
    pub servers: Vec<ServerAddress>,
    pub connection: ConnectionConfig,
    pub telemetry_interval: Duration,
    pub weather: WeatherConfig,
    pub skip_tmpdata_products: bool,
    pub simulation_mode: bool,
}

impl ConnectionConfigJson {
    pub fn to_connection_config(&self) -> Result<ConnectionConfig, String> {
        if self.connection_timeout_ms == 0 {
            return Err("connection_timeout_ms must be positive".to_string());
        }
        if self.ack_timeout_ms == 0 || self.ack_timeout_ms > ACK_TIMEOUT_MAX_MS {
            return Err(format!(
                "ack_timeout_ms {} must be in 1..={}",
                self.ack_timeout_ms, ACK_TIMEOUT_MAX_MS
            ));
        }
        if self.reconnect_delay_init_ms == 0 {
            return Err("reconnect_delay_init_ms must be positive".to_string());
        }
        if self.reconnect_delay_max_ms < self.reconnect_delay_init_ms {
            return Err("reconnect_delay_max_ms is less than reconnect_delay_init_ms".to_string());
        }

        Ok(ConnectionConfig {
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            auto_reconnect: self.auto_reconnect,
            reconnect_delay_init: Duration::from_millis(self.reconnect_delay_init_ms),
            reconnect_delay_max: Duration::from_millis(self.reconnect_delay_max_ms),
            reconnect_max_retries: self.reconnect_max_retries,
        })
    }
}

impl WeatherConfigJson {
    pub fn to_weather_config(&self) -> Result<WeatherConfig, String> {
        if self.poll_interval_ms == 0 {
            return Err("weather poll_interval_ms must be positive".to_string());
        }
        Ok(WeatherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            file: self.file.as_ref().map(PathBuf::from),
        })
    }
}

impl DreamConfigJson {
    pub fn to_dream_config(&self) -> Result<DreamConfig, String> {
        if self.servers.is_empty() {
            return Err("At least one server must be configured".to_string());
        }
        let mut seen: BTreeSet<ServerId> = BTreeSet::new();
        for server in &self.servers {
            if !seen.insert(server.id) {
                return Err(format!("Server {} configured more than once", server.id));
            }
            if server.host.is_empty() {
                return Err(format!("Server {} has no host", server.id));
            }
        }
        if !(TELEMETRY_INTERVAL_MIN_MS..=TELEMETRY_INTERVAL_MAX_MS)
            .contains(&self.telemetry_interval_ms)
        {
            return Err(format!(
                "telemetry_interval_ms {} must be in {}..={}",
                self.telemetry_interval_ms, TELEMETRY_INTERVAL_MIN_MS, TELEMETRY_INTERVAL_MAX_MS
            ));
        }

        Ok(DreamConfig {
            servers: self.servers.clone(),
            connection: self.connection.to_connection_config()?,
            telemetry_interval: Duration::from_millis(self.telemetry_interval_ms),
            weather: self.weather.to_weather_config()?,
            skip_tmpdata_products: self.data_products.skip_tmpdata_products,
            simulation_mode: self.simulation_mode,
        })
    }
}
