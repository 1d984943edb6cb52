use anyhow::{anyhow, Context, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::{lookup_host, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::network::{ConnectedNotifier, Credentials, NetworkBringUp};
use crate::settings::NodeSettings;

use super::mqtt::BrokerAddress;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Network bring-up on a Linux host whose supplicant owns the association.
///
/// Watches the interface's operstate and reports connectivity once it is up
/// and holds an address routable toward the broker.
pub struct LinkMonitor {
    operstate: PathBuf,
    interface: String,
    probe: BrokerAddress,
    poll: Duration,
    task: Option<JoinHandle<()>>,
}

impl LinkMonitor {
    pub fn new(
        net_root: impl Into<PathBuf>,
        interface: &str,
        probe: BrokerAddress,
        poll: Duration,
    ) -> Self {
        Self {
            operstate: net_root.into().join(interface).join("operstate"),
            interface: interface.to_string(),
            probe,
            poll,
            task: None,
        }
    }

    pub fn from_settings(settings: &NodeSettings) -> Result<Self> {
        let probe = BrokerAddress::parse(&settings.mqtt.broker_uri)?;
        Ok(Self::new(
            &settings.host.net_root,
            &settings.host.net_interface,
            probe,
            LINK_POLL_INTERVAL,
        ))
    }
}

impl NetworkBringUp for LinkMonitor {
    fn connect(&mut self, credentials: &Credentials, notifier: ConnectedNotifier) -> Result<()> {
        log_info!(
            "starting network bring-up on {} for SSID '{}' ({:?})",
            self.interface,
            credentials.ssid,
            credentials.auth_mode
        );

        let runtime = tokio::runtime::Handle::try_current()
            .context("Network bring-up needs a running async runtime")?;

        if let Some(previous) = self.task.take() {
            previous.abort();
        }
        self.task = Some(runtime.spawn(watch_link(
            self.operstate.clone(),
            self.interface.clone(),
            self.probe.clone(),
            self.poll,
            notifier,
        )));
        Ok(())
    }
}

impl Drop for LinkMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn watch_link(
    operstate: PathBuf,
    interface: String,
    probe: BrokerAddress,
    poll: Duration,
    notifier: ConnectedNotifier,
) {
    let mut link_up = false;

    loop {
        let up = link_is_up(&operstate).await;

        if up && !link_up {
            match local_address_toward(&probe).await {
                Ok(ip) => {
                    link_up = true;
                    if notifier.notify(ip) {
                        log_info!("{interface} connected, address {ip}");
                    } else {
                        log_info!("{interface} reassociated, address {ip}");
                    }
                }
                Err(err) => log_debug!("{interface} up but not routable yet: {err:#}"),
            }
        } else if !up && link_up {
            link_up = false;
            log_warn!("{interface} link lost; waiting for reassociation");
        }

        tokio::time::sleep(poll).await;
    }
}

async fn link_is_up(operstate: &Path) -> bool {
    tokio::fs::read_to_string(operstate)
        .await
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

/// Local address the kernel would use to reach the broker. Sends nothing.
async fn local_address_toward(probe: &BrokerAddress) -> Result<IpAddr> {
    let target = lookup_host((probe.host.as_str(), probe.port))
        .await
        .with_context(|| format!("Failed to resolve {}", probe.host))?
        .next()
        .ok_or_else(|| anyhow!("{} resolved to no addresses", probe.host))?;

    // The probe socket must share the broker's address family.
    let unspecified: IpAddr = match target {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = UdpSocket::bind((unspecified, 0))
        .await
        .context("Failed to bind route probe socket")?;
    socket
        .connect(target)
        .await
        .with_context(|| format!("No route toward {target}"))?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{connectivity_signal, AuthMode};
    use std::fs;
    use tempfile::TempDir;

    fn loopback_probe() -> BrokerAddress {
        BrokerAddress {
            host: "127.0.0.1".into(),
            port: 1883,
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("gate-node", "secret", AuthMode::Wpa2Psk)
    }

    #[tokio::test]
    async fn link_up_fires_connectivity() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("wlan0")).unwrap();
        fs::write(root.path().join("wlan0").join("operstate"), "up\n").unwrap();

        let mut monitor = LinkMonitor::new(root.path(), "wlan0", loopback_probe(), Duration::from_millis(10));
        let (notifier, mut waiter) = connectivity_signal();
        monitor.connect(&credentials(), notifier).unwrap();

        let ip = tokio::time::timeout(Duration::from_secs(5), waiter.wait_connected())
            .await
            .expect("link monitor must report connectivity")
            .unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn link_down_keeps_waiting() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("wlan0")).unwrap();
        fs::write(root.path().join("wlan0").join("operstate"), "down\n").unwrap();

        let mut monitor = LinkMonitor::new(root.path(), "wlan0", loopback_probe(), Duration::from_millis(10));
        let (notifier, mut waiter) = connectivity_signal();
        monitor.connect(&credentials(), notifier).unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(200), waiter.wait_connected()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn route_probe_follows_broker_address_family() {
        let v6 = BrokerAddress::parse("mqtt://[::1]:1883").unwrap();
        assert_eq!(
            local_address_toward(&v6).await.unwrap(),
            IpAddr::V6(Ipv6Addr::LOCALHOST)
        );
        assert_eq!(
            local_address_toward(&loopback_probe()).await.unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }

    #[tokio::test]
    async fn ipv6_broker_fires_connectivity() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("wlan0")).unwrap();
        fs::write(root.path().join("wlan0").join("operstate"), "up\n").unwrap();

        let probe = BrokerAddress::parse("mqtt://[::1]:1883").unwrap();
        let mut monitor = LinkMonitor::new(root.path(), "wlan0", probe, Duration::from_millis(10));
        let (notifier, mut waiter) = connectivity_signal();
        monitor.connect(&credentials(), notifier).unwrap();

        let ip = tokio::time::timeout(Duration::from_secs(5), waiter.wait_connected())
            .await
            .expect("link monitor must report connectivity")
            .unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn connect_without_runtime_fails() {
        let mut monitor = LinkMonitor::new("/nonexistent", "wlan0", loopback_probe(), Duration::from_millis(10));
        let (notifier, _waiter) = connectivity_signal();

        assert!(monitor.connect(&credentials(), notifier).is_err());
    }
}
