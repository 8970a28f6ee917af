// ── Runtime bridge configuration ──
//
// Describes *how* to talk to the Freedompro cloud and how often to
// resynchronize. Carries the token and tuning, but never touches disk.
// The binary builds a `BridgeConfig` via `freedompro-config` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use freedompro_api::ReconnectConfig;
use freedompro_api::client::DEFAULT_BASE_URL;
use freedompro_api::transport::{TlsMode, TransportConfig};

/// Which endpoint supplies the device list during discovery.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceSource {
    /// `GET devices/`: devices with nested accessories.
    #[default]
    Devices,
    /// `GET accessories`: flat legacy list, one pseudo-device per accessory.
    Accessories,
}

/// Configuration for a single bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// API root, e.g. `https://api.freedompro.eu/api/freedompro/`.
    pub base_url: String,
    /// Bearer token.
    pub api_key: SecretString,
    /// Optional extra CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
    /// REST request timeout.
    pub timeout: Duration,
    pub device_source: DeviceSource,
    /// Consume the live event feed.
    pub stream_enabled: bool,
    pub reconnect: ReconnectConfig,
    /// Per-accessory state poll period. Zero disables the loop.
    pub accessory_poll_interval: Duration,
    /// Global state poll period. Zero disables the loop.
    pub global_poll_interval: Duration,
}

impl BridgeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            ca_cert: None,
            timeout: Duration::from_secs(30),
            device_source: DeviceSource::default(),
            stream_enabled: true,
            reconnect: ReconnectConfig::default(),
            accessory_poll_interval: Duration::from_secs(60),
            global_poll_interval: Duration::from_secs(5),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self
                .ca_cert
                .clone()
                .map_or(TlsMode::System, TlsMode::CustomCa),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cloud_cadence() {
        let config = BridgeConfig::new(SecretString::from("k".to_string()));
        assert_eq!(config.accessory_poll_interval, Duration::from_secs(60));
        assert_eq!(config.global_poll_interval, Duration::from_secs(5));
        assert!(config.stream_enabled);
        assert_eq!(config.device_source, DeviceSource::Devices);
    }

    #[test]
    fn device_source_parses_snake_case() {
        assert_eq!(
            "accessories".parse::<DeviceSource>().ok(),
            Some(DeviceSource::Accessories)
        );
        assert_eq!(DeviceSource::Devices.to_string(), "devices");
    }
}
