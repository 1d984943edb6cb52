//! Minimal MQTT 3.1.1 publisher for the host platform.
//!
//! Only what a status node needs: CONNECT with a clean session, PUBLISH at
//! QoS 0 or 1, keep-alive pings, reconnect on failure and DISCONNECT on
//! shutdown.
//!
//! Publishes accepted while the broker session is down wait in an outbox and
//! go out once the next CONNACK arrives. Once a frame is handed to the socket
//! it is gone: PUBACK and PINGRESP are read and discarded, so a QoS 1 frame
//! lost to a failed write is never resent.
//!
//! [`MqttPublisher::shutdown`] closes the outbox and lets the session connect,
//! drain it and say DISCONNECT within the grace period; only then is the
//! session cancelled outright.

use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::reporting::{PublishChannel, Qos};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE_SECS: u16 = 60;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const HARD_STOP_GRACE: Duration = Duration::from_millis(200);
const MAX_REMAINING_LENGTH: usize = 268_435_455;

const PINGREQ: [u8; 2] = [0xC0, 0x00];
const DISCONNECT: [u8; 2] = [0xE0, 0x00];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parses `mqtt://host[:port][/...]`.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("mqtt://")
            .ok_or_else(|| anyhow!("broker URI '{uri}' must use the mqtt:// scheme"))?;
        let authority = rest.split('/').next().unwrap_or_default();

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| anyhow!("unterminated IPv6 literal in '{uri}'"))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, parse_port(port, uri)?),
                None => (host, DEFAULT_PORT),
            }
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port, uri)?),
                None => (authority, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            bail!("broker URI '{uri}' has no host");
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

fn parse_port(port: &str, uri: &str) -> Result<u16> {
    port.parse()
        .with_context(|| format!("invalid port '{port}' in broker URI '{uri}'"))
}

fn push_remaining_length(out: &mut Vec<u8>, mut len: usize) -> Result<()> {
    if len > MAX_REMAINING_LENGTH {
        bail!("packet of {len} bytes exceeds the MQTT size limit");
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

fn push_str(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| anyhow!("string of {} bytes is too long for MQTT", value.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn frame(header: u8, body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len() + 5);
    out.push(header);
    push_remaining_length(&mut out, body.len())?;
    out.extend_from_slice(body);
    Ok(out)
}

pub(crate) fn encode_connect(client_id: &str, keep_alive_secs: u16) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    push_str(&mut body, "MQTT")?;
    body.push(4); // protocol level 3.1.1
    body.push(0x02); // clean session, no will, no credentials
    body.extend_from_slice(&keep_alive_secs.to_be_bytes());
    push_str(&mut body, client_id)?;
    frame(0x10, &body)
}

pub(crate) fn encode_publish(
    topic: &str,
    payload: &[u8],
    qos: Qos,
    retain: bool,
    packet_id: u16,
) -> Result<Vec<u8>> {
    let qos_bits = match qos {
        Qos::AtMostOnce | Qos::AtLeastOnce => qos.level(),
        Qos::ExactlyOnce => bail!("QoS 2 is not supported by this client"),
    };

    let mut header = 0x30 | (qos_bits << 1);
    if retain {
        header |= 0x01;
    }

    let mut body = Vec::with_capacity(topic.len() + payload.len() + 4);
    push_str(&mut body, topic)?;
    if qos_bits > 0 {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    frame(header, &body)
}

pub(crate) fn check_connack(packet: &[u8; 4]) -> Result<()> {
    if packet[0] != 0x20 || packet[1] != 0x02 {
        bail!("expected CONNACK, got {packet:02x?}");
    }
    match packet[3] {
        0 => Ok(()),
        1 => bail!("broker refused connection: unacceptable protocol version"),
        2 => bail!("broker refused connection: client identifier rejected"),
        3 => bail!("broker refused connection: server unavailable"),
        4 => bail!("broker refused connection: bad user name or password"),
        5 => bail!("broker refused connection: not authorized"),
        code => bail!("broker refused connection with code {code}"),
    }
}

struct Shared {
    client_id: String,
    started: AtomicBool,
    closing: AtomicBool,
    connected: AtomicBool,
    next_packet_id: AtomicU16,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

/// Cloneable handle; all clones share one broker session.
#[derive(Clone)]
pub struct MqttPublisher {
    shared: Arc<Shared>,
}

impl MqttPublisher {
    pub fn new(client_id: &str) -> Self {
        Self {
            shared: Arc::new(Shared {
                client_id: client_id.to_string(),
                started: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                next_packet_id: AtomicU16::new(1),
                outgoing: Mutex::new(None),
                task: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Whether the broker session is currently established.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn next_packet_id(&self) -> u16 {
        loop {
            let id = self.shared.next_packet_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Stops accepting publishes, then gives the session up to `grace` to
    /// connect, flush the outbox and say DISCONNECT before cancelling it.
    pub async fn shutdown(&self, grace: Duration) {
        self.shared.closing.store(true, Ordering::SeqCst);

        // A closed outbox ends the session once its queued frames are written.
        match self.shared.outgoing.lock() {
            Ok(mut guard) => drop(guard.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }

        let task = match self.shared.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(mut task) = task {
            match time::timeout(grace, &mut task).await {
                Ok(_) => log_debug!("publish channel drained and stopped"),
                Err(_) => {
                    log_warn!(
                        "publish channel did not drain within {}ms; dropping queued reports",
                        grace.as_millis()
                    );
                    self.shared.cancel.cancel();
                    if time::timeout(HARD_STOP_GRACE, &mut task).await.is_err() {
                        task.abort();
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
    }
}

impl PublishChannel for MqttPublisher {
    fn start(&mut self, broker_uri: &str) -> Result<()> {
        let address = BrokerAddress::parse(broker_uri)?;
        let runtime = tokio::runtime::Handle::try_current()
            .context("Publish channel needs a running async runtime")?;

        let mut task = self
            .shared
            .task
            .lock()
            .map_err(|_| anyhow!("publisher state poisoned"))?;
        if task.is_some() {
            bail!("publish channel already started");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .shared
            .outgoing
            .lock()
            .map_err(|_| anyhow!("publisher state poisoned"))? = Some(tx);

        log_info!("publish channel starting for {}:{}", address.host, address.port);
        *task = Some(runtime.spawn(run_client(address, Arc::clone(&self.shared), rx)));
        self.shared.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst) && !self.shared.closing.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<()> {
        if !self.is_ready() {
            bail!("publish channel not started");
        }

        let frame = encode_publish(topic, payload, qos, retain, self.next_packet_id())?;
        let outgoing = self
            .shared
            .outgoing
            .lock()
            .map_err(|_| anyhow!("publisher state poisoned"))?;
        outgoing
            .as_ref()
            .ok_or_else(|| anyhow!("publish channel closed"))?
            .send(frame)
            .map_err(|_| anyhow!("publish channel closed"))
    }
}

async fn run_client(
    address: BrokerAddress,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    loop {
        match run_session(&address, &shared, &mut outgoing).await {
            Ok(()) => break,
            Err(err) => {
                if shared.connected.swap(false, Ordering::SeqCst) {
                    log_warn!("disconnected from broker: {err:#}");
                } else {
                    log_warn!("broker connection failed: {err:#}");
                }
            }
        }

        tokio::select! {
            _ = time::sleep(RECONNECT_DELAY) => {}
            _ = shared.cancel.cancelled() => break,
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
}

/// One TCP session. `Ok` means a requested shutdown; errors trigger a reconnect.
async fn run_session(
    address: &BrokerAddress,
    shared: &Shared,
    outgoing: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<()> {
    let mut stream = tokio::select! {
        connected = time::timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((address.host.as_str(), address.port)),
        ) => connected
            .context("timed out connecting to broker")?
            .context("tcp connect to broker failed")?,
        _ = shared.cancel.cancelled() => return Ok(()),
    };

    stream
        .write_all(&encode_connect(&shared.client_id, KEEP_ALIVE_SECS)?)
        .await
        .context("failed to write CONNECT")?;

    let mut connack = [0u8; 4];
    time::timeout(CONNECT_TIMEOUT, stream.read_exact(&mut connack))
        .await
        .context("timed out waiting for CONNACK")?
        .context("failed to read CONNACK")?;
    check_connack(&connack)?;

    shared.connected.store(true, Ordering::SeqCst);
    log_info!("connected to broker {}:{}", address.host, address.port);

    let ping_every = Duration::from_secs(u64::from(KEEP_ALIVE_SECS / 2));
    let mut ping = time::interval_at(Instant::now() + ping_every, ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut inbound = [0u8; 256];

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                match frame {
                    Some(frame) => stream.write_all(&frame).await.context("failed to write PUBLISH")?,
                    None => {
                        stream.write_all(&DISCONNECT).await?;
                        stream.flush().await?;
                        shared.connected.store(false, Ordering::SeqCst);
                        log_info!("outbox drained; disconnected from broker");
                        return Ok(());
                    }
                }
            }
            read = stream.read(&mut inbound) => {
                if read.context("broker read failed")? == 0 {
                    bail!("broker closed the connection");
                }
            }
            _ = ping.tick() => {
                stream.write_all(&PINGREQ).await.context("failed to write PINGREQ")?;
            }
            _ = shared.cancel.cancelled() => {
                while let Ok(frame) = outgoing.try_recv() {
                    stream.write_all(&frame).await?;
                }
                stream.write_all(&DISCONNECT).await?;
                stream.flush().await?;
                shared.connected.store(false, Ordering::SeqCst);
                log_info!("disconnected from broker");
                return Ok(());
            }
        }
    }
}
