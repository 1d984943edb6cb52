pub mod controller;
pub mod session;
pub mod state;

pub use controller::LifecycleController;
pub use session::{SessionContext, SessionStats};
pub use state::{LifecyclePhase, LifecycleState};
