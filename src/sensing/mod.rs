pub mod loop_worker;
pub mod reader;

pub use loop_worker::monitoring_loop;
pub use reader::{InputPin, InterruptType, PinConfig, PinMode, SensorReader};
