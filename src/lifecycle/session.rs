use anyhow::{bail, Result};
use serde::Serialize;

use crate::models::GateLevel;
use crate::reporting::ReportOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub polls: u64,
    pub published: u32,
    pub skipped: u32,
}

/// Everything one awake period knows. Dropped when the node suspends.
pub struct SessionContext<C> {
    channel: Option<C>,
    last_observed: Option<GateLevel>,
    stats: SessionStats,
}

impl<C> Default for SessionContext<C> {
    fn default() -> Self {
        Self {
            channel: None,
            last_observed: None,
            stats: SessionStats::default(),
        }
    }
}

impl<C> SessionContext<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The publish handle is written once, before the first report.
    pub fn attach_channel(&mut self, channel: C) -> Result<()> {
        if self.channel.is_some() {
            bail!("publish channel already attached to this session");
        }
        self.channel = Some(channel);
        Ok(())
    }

    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    pub fn last_observed(&self) -> Option<GateLevel> {
        self.last_observed
    }

    pub(crate) fn set_last_observed(&mut self, level: GateLevel) {
        self.last_observed = Some(level);
    }

    pub(crate) fn record_poll(&mut self) {
        self.stats.polls = self.stats.polls.saturating_add(1);
    }

    pub(crate) fn record_report(&mut self, outcome: ReportOutcome) {
        match outcome {
            ReportOutcome::Published => self.stats.published = self.stats.published.saturating_add(1),
            ReportOutcome::Skipped => self.stats.skipped = self.stats.skipped.saturating_add(1),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}
