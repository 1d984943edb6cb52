use anyhow::{Context, Result};

use crate::models::GateLevel;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    Disabled,
}

/// Electrical setup applied once to the monitored pin at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub pin: u32,
    pub mode: PinMode,
    pub pull_up: bool,
    pub pull_down: bool,
    pub interrupt: InterruptType,
}

impl PinConfig {
    /// Input with pull-up: an open switch reads high, the closed one pulls low.
    /// In-session changes are polled, so the pin interrupt stays off.
    pub const fn reed_switch(pin: u32) -> Self {
        Self {
            pin,
            mode: PinMode::Input,
            pull_up: true,
            pull_down: false,
            interrupt: InterruptType::Disabled,
        }
    }
}

/// Platform pin primitive consumed by the reader.
pub trait InputPin {
    fn configure(&mut self, config: &PinConfig) -> Result<()>;

    /// Current logical level. Implementations handle their own read errors.
    fn is_high(&mut self) -> bool;
}

pub struct SensorReader<P> {
    pin: P,
    pin_id: u32,
}

impl<P: InputPin> SensorReader<P> {
    /// Configures the pin; any failure here is a fatal startup error.
    pub fn setup(mut pin: P, config: &PinConfig) -> Result<Self> {
        pin.configure(config)
            .with_context(|| format!("Failed to configure reed input on pin {}", config.pin))?;
        log_info!(
            "reed input configured on pin {} (pull-up={}, pull-down={})",
            config.pin,
            config.pull_up,
            config.pull_down
        );
        Ok(Self {
            pin,
            pin_id: config.pin,
        })
    }

    pub fn read(&mut self) -> GateLevel {
        GateLevel::from_pin_high(self.pin.is_high())
    }

    pub fn pin_id(&self) -> u32 {
        self.pin_id
    }
}
