pub mod gate;
pub mod status;
pub mod wake;

pub use gate::GateLevel;
pub use status::StatusMessage;
pub use wake::WakeArmRequest;
