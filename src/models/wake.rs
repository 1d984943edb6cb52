use serde::{Deserialize, Serialize};

use super::GateLevel;

/// One-shot wake condition handed to the sleep primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WakeArmRequest {
    pub pin: u32,
    pub required_level: GateLevel,
}

impl WakeArmRequest {
    /// Wake on the level opposite to the one that sent the node to sleep.
    pub const fn after_observing(pin: u32, level: GateLevel) -> Self {
        Self {
            pin,
            required_level: level.opposite(),
        }
    }
}
