pub mod channel;
pub mod reporter;

pub use channel::{PublishChannel, Qos};
pub use reporter::{detect_transition, ReportOutcome, TransitionReporter};
