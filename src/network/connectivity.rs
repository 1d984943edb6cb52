use anyhow::{anyhow, Result};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Creates the single-slot barrier between network bring-up and the controller.
pub fn connectivity_signal() -> (ConnectedNotifier, ConnectivityWaiter) {
    let (tx, rx) = watch::channel(None);
    (
        ConnectedNotifier { tx: Arc::new(tx) },
        ConnectivityWaiter { rx },
    )
}

/// Producer side, handed to the network collaborator.
#[derive(Clone)]
pub struct ConnectedNotifier {
    tx: Arc<watch::Sender<Option<IpAddr>>>,
}

impl ConnectedNotifier {
    /// Sets the signal. Only the first call has an effect; returns whether it did.
    pub fn notify(&self, ip: IpAddr) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(ip);
            true
        })
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

pub struct ConnectivityWaiter {
    rx: watch::Receiver<Option<IpAddr>>,
}

impl ConnectivityWaiter {
    /// Blocks until the network reports an address. There is no timeout.
    ///
    /// Fails only if every notifier was dropped without firing.
    pub async fn wait_connected(&mut self) -> Result<IpAddr> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| anyhow!("network collaborator dropped the connectivity signal"))?;
        (*slot).ok_or_else(|| anyhow!("connectivity signal fired without an address"))
    }
}
