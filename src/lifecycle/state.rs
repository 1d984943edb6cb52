use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GateLevel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    Booting,
    InitialReadDone,
    SleepingClosed,
    MonitoringOpen,
}

impl Default for LifecyclePhase {
    fn default() -> Self {
        LifecyclePhase::Booting
    }
}

impl LifecyclePhase {
    pub const fn label(self) -> &'static str {
        match self {
            LifecyclePhase::Booting => "Booting",
            LifecyclePhase::InitialReadDone => "InitialReadDone",
            LifecyclePhase::SleepingClosed => "SleepingClosed",
            LifecyclePhase::MonitoringOpen => "MonitoringOpen",
        }
    }

    /// Nothing follows sleep within a process instance; the next boot starts over.
    pub const fn is_terminal(self) -> bool {
        matches!(self, LifecyclePhase::SleepingClosed)
    }

    pub const fn can_advance_to(self, next: LifecyclePhase) -> bool {
        matches!(
            (self, next),
            (LifecyclePhase::Booting, LifecyclePhase::InitialReadDone)
                | (LifecyclePhase::InitialReadDone, LifecyclePhase::SleepingClosed)
                | (LifecyclePhase::InitialReadDone, LifecyclePhase::MonitoringOpen)
                | (LifecyclePhase::MonitoringOpen, LifecyclePhase::SleepingClosed)
        )
    }

    /// Where the boot-time reading sends the controller.
    pub const fn after_initial_read(level: GateLevel) -> Self {
        match level {
            GateLevel::Closed => LifecyclePhase::SleepingClosed,
            GateLevel::Open => LifecyclePhase::MonitoringOpen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleState {
    pub phase: LifecyclePhase,
    /// Correlates log lines of one process instance; regenerated on every boot.
    pub boot_id: Uuid,
    pub booted_at: DateTime<Utc>,
    pub boot_level: Option<GateLevel>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            phase: LifecyclePhase::Booting,
            boot_id: Uuid::new_v4(),
            booted_at: Utc::now(),
            boot_level: None,
        }
    }
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, next: LifecyclePhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            bail!(
                "invalid lifecycle transition {} -> {}",
                self.phase.label(),
                next.label()
            );
        }
        self.phase = next;
        Ok(())
    }

    pub fn record_boot_level(&mut self, level: GateLevel) -> Result<()> {
        self.boot_level = Some(level);
        self.advance(LifecyclePhase::InitialReadDone)
    }
}
