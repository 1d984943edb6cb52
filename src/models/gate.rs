use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical level of the reed input. Low means the magnet is present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum GateLevel {
    Closed,
    Open,
}

impl GateLevel {
    pub const fn from_pin_high(high: bool) -> Self {
        if high {
            GateLevel::Open
        } else {
            GateLevel::Closed
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, GateLevel::Open)
    }

    pub const fn opposite(self) -> Self {
        match self {
            GateLevel::Closed => GateLevel::Open,
            GateLevel::Open => GateLevel::Closed,
        }
    }

    /// Status text published for this level.
    pub const fn label(self) -> &'static str {
        match self {
            GateLevel::Closed => "Fechado",
            GateLevel::Open => "Aberto",
        }
    }
}

impl fmt::Display for GateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
