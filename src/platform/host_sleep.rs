use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{GateLevel, WakeArmRequest};
use crate::power::SleepPrimitive;

use super::sysfs_gpio::read_value;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Level-triggered "deep sleep" for a Linux host.
///
/// The process idles on the wake pin and then replaces itself with a fresh
/// image of the same binary, so nothing from the previous boot survives.
pub struct ExecOnWake {
    value_path: PathBuf,
    poll: Duration,
    armed: Option<WakeArmRequest>,
}

impl ExecOnWake {
    pub fn new(value_path: impl Into<PathBuf>, poll: Duration) -> Self {
        Self {
            value_path: value_path.into(),
            poll,
            armed: None,
        }
    }

    pub fn armed(&self) -> Option<WakeArmRequest> {
        self.armed
    }

    /// Whether the armed wake level is currently present on the pin.
    pub fn wake_condition_met(&self) -> Result<bool> {
        let Some(request) = self.armed else {
            return Ok(false);
        };
        let level = GateLevel::from_pin_high(read_value(&self.value_path)?);
        Ok(level == request.required_level)
    }
}

impl SleepPrimitive for ExecOnWake {
    fn arm_level_wake(&mut self, request: &WakeArmRequest) -> Result<()> {
        // Fail now rather than sleep on a pin that can never be read.
        read_value(&self.value_path)?;
        self.armed = Some(*request);
        log_info!(
            "wake armed on pin {} for level {}",
            request.pin,
            request.required_level
        );
        Ok(())
    }

    fn suspend_indefinitely(&mut self) -> ! {
        if self.armed.is_none() {
            log_error!("suspended without a wake source; halting");
            loop {
                std::thread::park();
            }
        }

        loop {
            match self.wake_condition_met() {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => log_warn!("wake pin unreadable while suspended: {err:#}"),
            }
            std::thread::sleep(self.poll);
        }

        log_info!("wake condition met; rebooting");
        reboot()
    }
}

#[cfg(unix)]
fn reboot() -> ! {
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    match std::env::current_exe() {
        Ok(exe) => {
            let err = Command::new(exe).args(std::env::args_os().skip(1)).exec();
            log_error!("re-exec after wake failed: {err}");
        }
        Err(err) => log_error!("cannot locate own executable after wake: {err}"),
    }
    std::process::exit(1)
}

#[cfg(not(unix))]
fn reboot() -> ! {
    // Without exec, leave the restart to the service supervisor.
    std::process::exit(0)
}
