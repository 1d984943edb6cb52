use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ConnectedNotifier;

/// Minimum security the station accepts from an access point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa3Psk,
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::Wpa2Psk
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
    pub auth_mode: AuthMode,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str, auth_mode: AuthMode) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
            auth_mode,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("auth_mode", &self.auth_mode)
            .finish()
    }
}

/// Network association, driven by the platform.
///
/// `connect` only starts association; the implementation fires the notifier
/// from its own task once an address is held, and deals with link loss by
/// itself afterwards.
pub trait NetworkBringUp {
    fn connect(&mut self, credentials: &Credentials, notifier: ConnectedNotifier) -> Result<()>;
}
