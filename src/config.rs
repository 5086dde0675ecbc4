use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::Result;
use crate::client::DEFAULT_TIMEOUT;
use crate::engine::DEFAULT_POLL_INTERVAL;
use crate::types::DeviceIdentity;

/// One entry of the `devices` list. Both fields are optional on the wire so
/// that a single bad entry does not reject the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default)]
    pub devices: Option<Vec<DeviceConfig>>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl BridgeConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Configured devices that have both an address and a display name.
    pub fn identities(&self) -> Vec<DeviceIdentity> {
        let Some(devices) = &self.devices else {
            info!("no devices configured");
            return Vec::new();
        };

        devices
            .iter()
            .filter_map(|d| {
                match (
                    d.ip_address.as_deref().filter(|s| !s.is_empty()),
                    d.display_name.as_deref().filter(|s| !s.is_empty()),
                ) {
                    (Some(address), Some(name)) => Some(DeviceIdentity::new(address, name)),
                    _ => {
                        warn!("skipping device with missing ipAddress or displayName");
                        None
                    }
                }
            })
            .collect()
    }
}
