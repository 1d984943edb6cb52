//! Linux host implementations of the node's platform seams.

pub mod host_net;
pub mod host_sleep;
pub mod mqtt;
pub mod sysfs_gpio;

#[cfg(test)]
pub mod sim;

pub use host_net::LinkMonitor;
pub use host_sleep::ExecOnWake;
pub use mqtt::{BrokerAddress, MqttPublisher};
pub use sysfs_gpio::SysfsPin;
