pub mod bring_up;
pub mod connectivity;

pub use bring_up::{AuthMode, Credentials, NetworkBringUp};
pub use connectivity::{connectivity_signal, ConnectedNotifier, ConnectivityWaiter};
