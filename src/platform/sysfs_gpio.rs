use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sensing::{InputPin, InterruptType, PinConfig, PinMode};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Reed input exposed through the Linux sysfs GPIO interface.
pub struct SysfsPin {
    root: PathBuf,
    pin: u32,
    /// Returned when a read fails, so a flaky read never flips the gate state.
    last_high: bool,
}

impl SysfsPin {
    pub fn new(root: impl Into<PathBuf>, pin: u32) -> Self {
        Self {
            root: root.into(),
            pin,
            last_high: false,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    pub fn value_path(&self) -> PathBuf {
        self.pin_dir().join("value")
    }
}

/// Parses the contents of a sysfs `value` file.
pub fn read_value(path: &Path) -> Result<bool> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => bail!("unexpected gpio value '{other}' in {}", path.display()),
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).with_context(|| format!("Failed to write '{value}' to {}", path.display()))
}

impl InputPin for SysfsPin {
    fn configure(&mut self, config: &PinConfig) -> Result<()> {
        if !self.pin_dir().exists() {
            write_attr(&self.root.join("export"), &self.pin.to_string())?;
        }

        let direction = match config.mode {
            PinMode::Input => "in",
        };
        write_attr(&self.pin_dir().join("direction"), direction)?;

        let edge = match config.interrupt {
            InterruptType::Disabled => "none",
        };
        write_attr(&self.pin_dir().join("edge"), edge)?;

        if config.pull_up || config.pull_down {
            log_warn!(
                "sysfs has no bias control; gpio{} relies on the board for its pull-{}",
                self.pin,
                if config.pull_up { "up" } else { "down" }
            );
        }

        // An unreadable value file is a configuration error, not a runtime one.
        self.last_high = read_value(&self.value_path())?;
        log_info!("gpio{} ready at {}", self.pin, self.pin_dir().display());
        Ok(())
    }

    fn is_high(&mut self) -> bool {
        match read_value(&self.value_path()) {
            Ok(high) => {
                self.last_high = high;
                high
            }
            Err(err) => {
                log_error!("gpio{} read failed, keeping last level: {err:#}", self.pin);
                self.last_high
            }
        }
    }
}
