use chrono::{DateTime, Utc};
use serde::Serialize;

use super::GateLevel;

/// One reportable gate status, addressed to the node's fixed topic.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub topic: String,
    pub level: GateLevel,
    pub observed_at: DateTime<Utc>,
}

impl StatusMessage {
    pub fn new(topic: impl Into<String>, level: GateLevel) -> Self {
        Self {
            topic: topic.into(),
            level,
            observed_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &'static str {
        self.level.label()
    }
}
