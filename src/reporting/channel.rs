use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Default for Qos {
    fn default() -> Self {
        Qos::AtLeastOnce
    }
}

impl Qos {
    pub const fn level(self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

/// Publish-channel session owned by the platform.
///
/// The core only starts it once and then publishes fire-and-forget; connect,
/// reconnect and delivery are the implementation's business.
pub trait PublishChannel {
    fn start(&mut self, broker_uri: &str) -> Result<()>;

    /// Whether a publish issued now would be accepted.
    fn is_ready(&self) -> bool;

    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<()>;
}
