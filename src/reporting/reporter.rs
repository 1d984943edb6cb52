use crate::lifecycle::SessionContext;
use crate::models::{GateLevel, StatusMessage};
use crate::settings::MqttSettings;

use super::{PublishChannel, Qos};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Published,
    Skipped,
}

/// Returns the new level when `current` is a reportable change from `previous`.
pub fn detect_transition(previous: GateLevel, current: GateLevel) -> Option<GateLevel> {
    (previous != current).then_some(current)
}

/// Formats gate levels into status messages and hands them to the channel.
#[derive(Debug, Clone)]
pub struct TransitionReporter {
    topic: String,
    qos: Qos,
    retain: bool,
}

impl TransitionReporter {
    pub fn new(topic: impl Into<String>, qos: Qos, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            qos,
            retain,
        }
    }

    pub fn from_settings(settings: &MqttSettings) -> Self {
        Self::new(settings.topic.clone(), settings.qos, settings.retain)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The first observation of a boot is always new.
    pub fn report_initial<C: PublishChannel>(
        &self,
        session: &mut SessionContext<C>,
        level: GateLevel,
    ) -> ReportOutcome {
        session.set_last_observed(level);
        self.report(session, level)
    }

    /// Reports `level` only if it differs from the session's last observation.
    pub fn report_if_changed<C: PublishChannel>(
        &self,
        session: &mut SessionContext<C>,
        level: GateLevel,
    ) -> Option<ReportOutcome> {
        let changed = match session.last_observed() {
            Some(previous) => detect_transition(previous, level),
            None => Some(level),
        }?;

        session.set_last_observed(changed);
        Some(self.report(session, changed))
    }

    fn report<C: PublishChannel>(
        &self,
        session: &mut SessionContext<C>,
        level: GateLevel,
    ) -> ReportOutcome {
        let message = StatusMessage::new(self.topic.as_str(), level);
        log_info!("gate: {}", message.payload());

        let outcome = match session.channel() {
            Some(channel) if channel.is_ready() => {
                match channel.publish(
                    &message.topic,
                    message.payload().as_bytes(),
                    self.qos,
                    self.retain,
                ) {
                    Ok(()) => ReportOutcome::Published,
                    Err(err) => {
                        log_warn!("publish to {} failed: {err:#}", message.topic);
                        ReportOutcome::Skipped
                    }
                }
            }
            _ => {
                log_debug!("publish channel not ready; dropping '{}'", message.payload());
                ReportOutcome::Skipped
            }
        };

        session.record_report(outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::RecordingChannel;
    use rstest::rstest;

    fn connected_session() -> (SessionContext<RecordingChannel>, RecordingChannel) {
        let channel = RecordingChannel::connected();
        let mut session = SessionContext::new();
        session.attach_channel(channel.clone()).unwrap();
        (session, channel)
    }

    fn reporter() -> TransitionReporter {
        TransitionReporter::new("casa/portao/estado", Qos::AtLeastOnce, false)
    }

    #[rstest]
    #[case(GateLevel::Closed, GateLevel::Closed, None)]
    #[case(GateLevel::Open, GateLevel::Open, None)]
    #[case(GateLevel::Closed, GateLevel::Open, Some(GateLevel::Open))]
    #[case(GateLevel::Open, GateLevel::Closed, Some(GateLevel::Closed))]
    fn transition_iff_levels_differ(
        #[case] previous: GateLevel,
        #[case] current: GateLevel,
        #[case] expected: Option<GateLevel>,
    ) {
        assert_eq!(detect_transition(previous, current), expected);
    }

    #[rstest]
    #[case(GateLevel::Closed, "Fechado")]
    #[case(GateLevel::Open, "Aberto")]
    fn initial_level_is_always_published(#[case] level: GateLevel, #[case] payload: &str) {
        let (mut session, channel) = connected_session();

        let outcome = reporter().report_initial(&mut session, level);

        assert_eq!(outcome, ReportOutcome::Published);
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "casa/portao/estado");
        assert_eq!(sent[0].payload, payload);
        assert_eq!(sent[0].qos, Qos::AtLeastOnce);
        assert!(!sent[0].retain);
        assert_eq!(session.last_observed(), Some(level));
    }

    #[test]
    fn repeated_levels_are_not_republished() {
        let (mut session, channel) = connected_session();
        let reporter = reporter();

        reporter.report_initial(&mut session, GateLevel::Open);
        for _ in 0..5 {
            assert_eq!(reporter.report_if_changed(&mut session, GateLevel::Open), None);
        }

        assert_eq!(channel.payloads(), vec!["Aberto"]);
    }

    #[test]
    fn change_updates_last_observed_and_publishes() {
        let (mut session, channel) = connected_session();
        let reporter = reporter();

        reporter.report_initial(&mut session, GateLevel::Open);
        let outcome = reporter.report_if_changed(&mut session, GateLevel::Closed);

        assert_eq!(outcome, Some(ReportOutcome::Published));
        assert_eq!(session.last_observed(), Some(GateLevel::Closed));
        assert_eq!(channel.payloads(), vec!["Aberto", "Fechado"]);
    }

    #[test]
    fn disconnected_channel_skips_silently() {
        let channel = RecordingChannel::disconnected();
        let mut session = SessionContext::new();
        session.attach_channel(channel.clone()).unwrap();

        let outcome = reporter().report_initial(&mut session, GateLevel::Open);

        assert_eq!(outcome, ReportOutcome::Skipped);
        assert!(channel.sent().is_empty());
        assert_eq!(session.stats().skipped, 1);
        // The observation still counts even though nothing went out.
        assert_eq!(session.last_observed(), Some(GateLevel::Open));
    }

    #[test]
    fn missing_channel_skips_silently() {
        let mut session: SessionContext<RecordingChannel> = SessionContext::new();

        let outcome = reporter().report_initial(&mut session, GateLevel::Closed);

        assert_eq!(outcome, ReportOutcome::Skipped);
    }

    #[test]
    fn publish_error_is_swallowed() {
        let channel = RecordingChannel::connected().rejecting_publishes();
        let mut session = SessionContext::new();
        session.attach_channel(channel.clone()).unwrap();

        let outcome = reporter().report_initial(&mut session, GateLevel::Closed);

        assert_eq!(outcome, ReportOutcome::Skipped);
        assert_eq!(session.stats().published, 0);
        assert_eq!(session.stats().skipped, 1);
    }
}
