//! Terminal hand-off between the lifecycle controller and the sleep hardware.
//!
//! The controller never suspends by itself. It returns an [`Outcome`], and the
//! bootstrap passes the requested wake condition to a [`SleepPrimitive`].

use anyhow::{Context, Result};
use std::convert::Infallible;

use crate::models::WakeArmRequest;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// How a controller run ends. Suspension is the only way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Suspend(WakeArmRequest),
}

pub trait SleepPrimitive {
    fn arm_level_wake(&mut self, request: &WakeArmRequest) -> Result<()>;

    /// Never returns; the next code to run after wake is a fresh boot.
    fn suspend_indefinitely(&mut self) -> !;
}

/// Arms the wake source, then suspends.
///
/// Takes the primitive by value so a process instance can suspend at most once.
/// Only a failed arm returns, and that is fatal.
pub fn enter_deep_sleep<S: SleepPrimitive>(
    mut sleep: S,
    request: &WakeArmRequest,
) -> Result<Infallible> {
    sleep.arm_level_wake(request).with_context(|| {
        format!(
            "Failed to arm wake on pin {} for {}",
            request.pin, request.required_level
        )
    })?;
    log_info!(
        "entering deep sleep until pin {} reads {}",
        request.pin,
        request.required_level
    );
    sleep.suspend_indefinitely()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GateLevel;
    use crate::platform::sim::{RecordingSleep, SleepEvent};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn wake_is_armed_before_suspend() {
        let sleep = RecordingSleep::new();
        let events = sleep.events();
        let request = WakeArmRequest::after_observing(3, GateLevel::Closed);

        let result = catch_unwind(AssertUnwindSafe(|| enter_deep_sleep(sleep, &request)));

        assert!(result.is_err(), "suspend must not return");
        assert_eq!(
            events.snapshot(),
            vec![SleepEvent::Armed(request), SleepEvent::Suspended]
        );
    }

    #[test]
    fn failed_arm_never_suspends() {
        let sleep = RecordingSleep::new().failing_arm();
        let events = sleep.events();
        let request = WakeArmRequest::after_observing(3, GateLevel::Closed);

        let err = enter_deep_sleep(sleep, &request).unwrap_err();

        assert!(format!("{err:#}").contains("pin 3"));
        assert!(events.snapshot().is_empty());
    }
}
