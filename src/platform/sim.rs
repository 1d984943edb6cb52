//! In-memory doubles for every platform seam, used by the unit tests.

use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{GateLevel, WakeArmRequest};
use crate::network::{ConnectedNotifier, Credentials, NetworkBringUp};
use crate::power::SleepPrimitive;
use crate::reporting::{PublishChannel, Qos};
use crate::sensing::{InputPin, PinConfig};

#[derive(Default)]
struct ProbeInner {
    config: Option<PinConfig>,
    reads: usize,
}

/// Observes a [`ScriptedPin`] after it has been moved into a reader.
#[derive(Clone, Default)]
pub struct PinProbe {
    inner: Arc<Mutex<ProbeInner>>,
}

impl PinProbe {
    pub fn applied_config(&self) -> Option<PinConfig> {
        self.inner.lock().unwrap().config
    }

    pub fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }
}

/// Replays levels in order, then keeps returning the last one.
pub struct ScriptedPin {
    levels: VecDeque<GateLevel>,
    last: GateLevel,
    fail_configuration: bool,
    probe: PinProbe,
}

impl ScriptedPin {
    pub fn new(levels: impl IntoIterator<Item = GateLevel>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            last: GateLevel::Closed,
            fail_configuration: false,
            probe: PinProbe::default(),
        }
    }

    pub fn failing_configuration(mut self) -> Self {
        self.fail_configuration = true;
        self
    }

    pub fn probe(&self) -> PinProbe {
        self.probe.clone()
    }
}

impl InputPin for ScriptedPin {
    fn configure(&mut self, config: &PinConfig) -> Result<()> {
        if self.fail_configuration {
            bail!("simulated gpio configuration failure");
        }
        self.probe.inner.lock().unwrap().config = Some(*config);
        Ok(())
    }

    fn is_high(&mut self) -> bool {
        if let Some(next) = self.levels.pop_front() {
            self.last = next;
        }
        self.probe.inner.lock().unwrap().reads += 1;
        self.last.is_high()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
}

#[derive(Default)]
struct ChannelInner {
    connected: AtomicBool,
    reject: AtomicBool,
    started: Mutex<Option<String>>,
    sent: Mutex<Vec<SentMessage>>,
}

#[derive(Clone, Default)]
pub struct RecordingChannel {
    inner: Arc<ChannelInner>,
}

impl RecordingChannel {
    pub fn connected() -> Self {
        let channel = Self::default();
        channel.inner.connected.store(true, Ordering::SeqCst);
        channel
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn rejecting_publishes(self) -> Self {
        self.inner.reject.store(true, Ordering::SeqCst);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent().into_iter().map(|message| message.payload).collect()
    }

    pub fn started_uri(&self) -> Option<String> {
        self.inner.started.lock().unwrap().clone()
    }
}

impl PublishChannel for RecordingChannel {
    fn start(&mut self, broker_uri: &str) -> Result<()> {
        *self.inner.started.lock().unwrap() = Some(broker_uri.to_string());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<()> {
        if self.inner.reject.load(Ordering::SeqCst) {
            bail!("simulated broker rejection");
        }
        self.inner.sent.lock().unwrap().push(SentMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
    }
}

/// Reports connectivity as soon as association starts.
pub struct ImmediateNetwork {
    fail: bool,
}

impl ImmediateNetwork {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl NetworkBringUp for ImmediateNetwork {
    fn connect(&mut self, _credentials: &Credentials, notifier: ConnectedNotifier) -> Result<()> {
        if self.fail {
            bail!("simulated radio failure");
        }
        notifier.notify(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 50)));
        Ok(())
    }
}

/// Accepts the notifier and never fires it.
pub struct SilentNetwork {
    held: Option<ConnectedNotifier>,
}

impl SilentNetwork {
    pub fn new() -> Self {
        Self { held: None }
    }
}

impl NetworkBringUp for SilentNetwork {
    fn connect(&mut self, _credentials: &Credentials, notifier: ConnectedNotifier) -> Result<()> {
        self.held = Some(notifier);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepEvent {
    Armed(WakeArmRequest),
    Suspended,
}

#[derive(Clone, Default)]
pub struct SleepLog {
    events: Arc<Mutex<Vec<SleepEvent>>>,
}

impl SleepLog {
    pub fn snapshot(&self) -> Vec<SleepEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: SleepEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Records the hand-off; "suspending" unwinds so tests can inspect the log.
pub struct RecordingSleep {
    log: SleepLog,
    fail_arm: bool,
}

impl RecordingSleep {
    pub fn new() -> Self {
        Self {
            log: SleepLog::default(),
            fail_arm: false,
        }
    }

    pub fn failing_arm(mut self) -> Self {
        self.fail_arm = true;
        self
    }

    pub fn events(&self) -> SleepLog {
        self.log.clone()
    }
}

impl SleepPrimitive for RecordingSleep {
    fn arm_level_wake(&mut self, request: &WakeArmRequest) -> Result<()> {
        if self.fail_arm {
            bail!("simulated wake source rejection");
        }
        self.log.push(SleepEvent::Armed(*request));
        Ok(())
    }

    fn suspend_indefinitely(&mut self) -> ! {
        self.log.push(SleepEvent::Suspended);
        panic!("suspended");
    }
}
