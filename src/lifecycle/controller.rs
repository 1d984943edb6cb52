use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::WakeArmRequest;
use crate::network::{connectivity_signal, Credentials, NetworkBringUp};
use crate::power::Outcome;
use crate::reporting::{PublishChannel, TransitionReporter};
use crate::sensing::{monitoring_loop, InputPin, PinConfig, SensorReader};
use crate::settings::NodeSettings;

use super::{LifecyclePhase, LifecycleState, SessionContext};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Drives one process instance from boot to the hand-off to sleep.
pub struct LifecycleController<P, N, C> {
    state: LifecycleState,
    pin: P,
    pin_config: PinConfig,
    network: N,
    credentials: Credentials,
    channel: C,
    broker_uri: String,
    reporter: TransitionReporter,
    poll_interval: Duration,
}

impl<P, N, C> LifecycleController<P, N, C>
where
    P: InputPin,
    N: NetworkBringUp,
    C: PublishChannel,
{
    pub fn new(settings: &NodeSettings, pin: P, network: N, channel: C) -> Self {
        Self {
            state: LifecycleState::new(),
            pin,
            pin_config: PinConfig::reed_switch(settings.reed.pin),
            network,
            credentials: settings.wifi.credentials(),
            channel,
            broker_uri: settings.mqtt.broker_uri.clone(),
            reporter: TransitionReporter::from_settings(&settings.mqtt),
            poll_interval: settings.poll_interval(),
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Runs until the gate is seen closed and returns the wake condition.
    ///
    /// Blocks without a timeout until the network reports connectivity. Errors
    /// are all startup failures; nothing after the first read can fail.
    pub async fn run(self) -> Result<Outcome> {
        let Self {
            mut state,
            pin,
            pin_config,
            mut network,
            credentials,
            mut channel,
            broker_uri,
            reporter,
            poll_interval,
        } = self;

        log_info!("boot {} starting", state.boot_id);

        let mut reader = SensorReader::setup(pin, &pin_config)?;

        let (notifier, mut waiter) = connectivity_signal();
        network
            .connect(&credentials, notifier)
            .context("Failed to start network bring-up")?;
        log_info!("waiting for network on SSID '{}'", credentials.ssid);
        let ip = waiter.wait_connected().await?;
        log_info!("network connected with address {ip}");

        channel
            .start(&broker_uri)
            .with_context(|| format!("Failed to start publish channel for {broker_uri}"))?;
        let mut session = SessionContext::new();
        session.attach_channel(channel)?;
        log_info!("publish channel started; reporting to {}", reporter.topic());

        // One snapshot feeds both the initial report and the branch below.
        let level = reader.read();
        state.record_boot_level(level)?;
        reporter.report_initial(&mut session, level);

        let branch = LifecyclePhase::after_initial_read(level);
        state.advance(branch)?;

        let wake = if branch == LifecyclePhase::MonitoringOpen {
            let wake = monitoring_loop(&mut reader, &mut session, &reporter, poll_interval).await;
            state.advance(LifecyclePhase::SleepingClosed)?;
            wake
        } else {
            log_info!("gate closed at boot; sleeping until it opens");
            WakeArmRequest::after_observing(reader.pin_id(), level)
        };

        let stats = session.stats();
        log_info!(
            "boot {} finished after {} polls ({} published, {} skipped); wake on pin {} -> {}",
            state.boot_id,
            stats.polls,
            stats.published,
            stats.skipped,
            wake.pin,
            wake.required_level
        );

        Ok(Outcome::Suspend(wake))
    }
}
