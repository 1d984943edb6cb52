use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::lifecycle::SessionContext;
use crate::models::{GateLevel, WakeArmRequest};
use crate::reporting::{PublishChannel, TransitionReporter};

use super::reader::{InputPin, SensorReader};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_info};

/// Polls the reed input while the gate is open.
///
/// The only way out is observing a change to closed, which yields the wake
/// condition for the following sleep.
pub async fn monitoring_loop<P: InputPin, C: PublishChannel>(
    reader: &mut SensorReader<P>,
    session: &mut SessionContext<C>,
    reporter: &TransitionReporter,
    poll_interval: Duration,
) -> WakeArmRequest {
    // First read happens one full interval after entering the loop.
    let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "gate open; monitoring pin {} every {}ms",
        reader.pin_id(),
        poll_interval.as_millis()
    );

    loop {
        ticker.tick().await;

        let level = reader.read();
        session.record_poll();

        if reporter.report_if_changed(session, level).is_none() {
            continue;
        }

        log_debug!("gate changed to {} after {} polls", level, session.stats().polls);

        if level == GateLevel::Closed {
            log_info!("gate closed while monitoring; preparing deep sleep");
            return WakeArmRequest::after_observing(reader.pin_id(), level);
        }
    }
}
