use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};

use crate::network::{AuthMode, Credentials};
use crate::reporting::Qos;

/// Log target stamped on every record; chosen at build time.
pub const LOG_TAG: &str = env!("GATENODE_LOG_TAG");

const EMBEDDED_SETTINGS: &str = include_str!(concat!(env!("OUT_DIR"), "/node_settings.json"));

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiSettings {
    pub ssid: String,
    pub password: String,
    pub auth_mode: AuthMode,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            ssid: "gate-node".into(),
            password: String::new(),
            auth_mode: AuthMode::Wpa2Psk,
        }
    }
}

impl fmt::Debug for WifiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiSettings")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("auth_mode", &self.auth_mode)
            .finish()
    }
}

impl WifiSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.ssid, &self.password, self.auth_mode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MqttSettings {
    pub broker_uri: String,
    pub client_id: String,
    pub topic: String,
    pub qos: Qos,
    pub retain: bool,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            broker_uri: "mqtt://192.168.0.37".into(),
            client_id: "portao".into(),
            topic: "casa/portao/estado".into(),
            qos: Qos::AtLeastOnce,
            retain: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReedSettings {
    pub pin: u32,
}

impl Default for ReedSettings {
    fn default() -> Self {
        Self { pin: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    /// Trades battery life against detection latency while the gate is open.
    pub poll_interval_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
        }
    }
}

/// Where the Linux host platform finds its pins and links.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSettings {
    pub gpio_root: PathBuf,
    pub net_root: PathBuf,
    pub net_interface: String,
    pub wake_poll_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            gpio_root: PathBuf::from("/sys/class/gpio"),
            net_root: PathBuf::from("/sys/class/net"),
            net_interface: "wlan0".into(),
            wake_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSettings {
    pub wifi: WifiSettings,
    pub mqtt: MqttSettings,
    pub reed: ReedSettings,
    pub monitor: MonitorSettings,
    pub host: HostSettings,
}

impl NodeSettings {
    /// Settings compiled into this binary by `build.rs`.
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_SETTINGS).context("Embedded node settings are invalid")
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(contents).context("Failed to parse node settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_interval_ms)
    }

    pub fn wake_poll_interval(&self) -> Duration {
        Duration::from_millis(self.host.wake_poll_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.wifi.ssid.trim().is_empty() {
            bail!("wifi.ssid must not be empty");
        }
        if !self.mqtt.broker_uri.starts_with("mqtt://") {
            bail!(
                "mqtt.brokerUri '{}' must use the mqtt:// scheme",
                self.mqtt.broker_uri
            );
        }
        if self.mqtt.topic.is_empty() {
            bail!("mqtt.topic must not be empty");
        }
        if self.mqtt.topic.contains(['+', '#']) {
            bail!("mqtt.topic '{}' must not contain wildcards", self.mqtt.topic);
        }
        if self.mqtt.qos == Qos::ExactlyOnce {
            bail!("mqtt.qos exactlyOnce is not supported; use atMostOnce or atLeastOnce");
        }
        if self.monitor.poll_interval_ms == 0 {
            bail!("monitor.pollIntervalMs must be greater than zero");
        }
        if self.host.wake_poll_ms == 0 {
            bail!("host.wakePollMs must be greater than zero");
        }
        Ok(())
    }
}
