//! Runner configuration file.
//!
//! ```yaml
//! link:
//!   bind: 127.0.0.1
//!   data_port: 7070
//!   at_port: 7071
//!   write_gap_ms: 20
//! meter:
//!   tariff: 25
//!   firmware: old
//!   disconnect_on_end: false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wateremu_meter::MeterConfig;
use wateremu_protocol::DEVICE_NAME;

use crate::error::RunnerError;

/// Default TCP port of the command/notify channel.
pub const DEFAULT_DATA_PORT: u16 = 7070;
/// Default TCP port of the AT text channel.
pub const DEFAULT_AT_PORT: u16 = 7071;
/// Default quiet time after which a buffered command is treated as complete.
pub const DEFAULT_WRITE_GAP_MS: u64 = 20;

/// Where the link stand-in listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address to bind both listeners to.
    pub bind: String,
    /// Port of the command/notify channel. `0` picks a free port.
    pub data_port: u16,
    /// Port of the AT text channel, if enabled.
    pub at_port: Option<u16>,
    /// Name to advertise.
    pub device_name: String,
    /// Milliseconds of client silence that end a command whose length byte
    /// is a marker.
    pub write_gap_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            bind: "127.0.0.1".to_string(),
            data_port: DEFAULT_DATA_PORT,
            at_port: Some(DEFAULT_AT_PORT),
            device_name: DEVICE_NAME.to_string(),
            write_gap_ms: DEFAULT_WRITE_GAP_MS,
        }
    }
}

impl LinkConfig {
    /// `bind:data_port`.
    pub fn data_addr(&self) -> String {
        format!("{}:{}", self.bind, self.data_port)
    }

    /// `bind:at_port`, if the AT channel is enabled.
    pub fn at_addr(&self) -> Option<String> {
        self.at_port.map(|port| format!("{}:{}", self.bind, port))
    }

    /// Quiet time that completes a buffered command.
    pub fn write_gap(&self) -> Duration {
        Duration::from_millis(self.write_gap_ms)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Link listeners.
    pub link: LinkConfig,
    /// Meter behaviour.
    pub meter: MeterConfig,
}

/// Load a configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RunnerConfig, RunnerError> {
    let yaml = std::fs::read_to_string(path)?;
    load_config_from_str(&yaml)
}

/// Load a configuration from a YAML string and validate it.
pub fn load_config_from_str(yaml: &str) -> Result<RunnerConfig, RunnerError> {
    let config: RunnerConfig = serde_yaml::from_str(yaml)?;
    config.meter.validate()?;
    Ok(config)
}
