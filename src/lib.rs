//! Gate node: reports a reed-switch gate as open or closed and sleeps while
//! it stays closed.
//!
//! The [`lifecycle`] controller owns all decisions and talks to the hardware
//! through the traits in [`sensing`], [`network`], [`reporting`] and [`power`].
//! [`platform`] provides the Linux host implementations used by the binary.

pub mod lifecycle;
pub mod models;
pub mod network;
pub mod platform;
pub mod power;
pub mod reporting;
pub mod sensing;
pub mod settings;
mod utils;

use anyhow::{Context, Result};
use std::time::Duration;

use lifecycle::LifecycleController;
use platform::{ExecOnWake, LinkMonitor, MqttPublisher, SysfsPin};
use power::{enter_deep_sleep, Outcome};
use settings::{NodeSettings, LOG_TAG};

/// How long the publisher gets to flush the last report before sleep.
const PUBLISH_FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Boots the node. Returns only on a fatal startup error.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!(target: LOG_TAG, "gate node booting...");

    let settings = NodeSettings::embedded()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let pin = SysfsPin::new(&settings.host.gpio_root, settings.reed.pin);
    let wake_source = ExecOnWake::new(pin.value_path(), settings.wake_poll_interval());
    let network = LinkMonitor::from_settings(&settings)?;
    let publisher = MqttPublisher::new(&settings.mqtt.client_id);

    let controller = LifecycleController::new(&settings, pin, network, publisher.clone());

    let outcome = runtime.block_on(async {
        let outcome = controller.run().await?;
        publisher.shutdown(PUBLISH_FLUSH_GRACE).await;
        Ok::<Outcome, anyhow::Error>(outcome)
    })?;

    // Nothing async may outlive the hand-off to sleep.
    drop(runtime);

    match outcome {
        Outcome::Suspend(request) => match enter_deep_sleep(wake_source, &request)? {},
    }
}
