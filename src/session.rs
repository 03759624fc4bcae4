//! # PCS Session Controller
//!
//! Owns one bus adapter and drives the protocol: a receive pump decodes the
//! periodic status frames into the device snapshot, a heartbeat loop emits
//! PF=0x1A every 200 ms on a monotonic schedule, and the command surface
//! pairs requests with their replies through a per-PF single-slot registry.
//!
//! One mutex guards the snapshot, `last_rx`, the reply registry, and the
//! last control vector together; callers never hold it across a send. The
//! link state lives in an atomic so front-ends can poll it without the lock.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::bus::{BusAdapter, BusStatsSnapshot};
use crate::constants::{
    BROADCAST_ADDR, CAN1_COMM_FAULT, CAN_TIMEOUT, CONTROLLER_ADDR, DEFAULT_COMMAND_TIMEOUT,
    DEFAULT_FRESH_WINDOW, DEFAULT_RX_TIMEOUT, HEARTBEAT_PERIOD, PCS_DEFAULT_ADDR,
    RX_POLL_DEADLINE,
};
use crate::error::{PcsError, SendError};
use crate::protocol::frame::{
    encode_heartbeat, encode_read_protection_params, encode_read_special_data,
    encode_set_protection_params1, encode_set_protection_params2, encode_set_protection_params3,
    encode_set_time, encode_start_stop, mode_frame_plan, ControlAction, ControlFlags, DcData,
    DeviceTime, HeartbeatData, HighResDc, ProtectionPage, ProtectionParams1, ProtectionParams2,
    ProtectionParams3, RxFrame, VersionInfo, PAYLOAD_LEN, SPECIAL_DATA_VERSIONS,
    SPECIAL_DATA_WORKING_MODE,
};
use crate::protocol::frame::{decode_rx_frame, CapacityEnergy, GridCurrent, GridVoltage, SystemPower};
use crate::protocol::id::CanId;
use crate::protocol::status::{fault_description, StatusData};
use crate::protocol::ModeSetpoint;
use crate::state::{FieldReading, PcsSnapshot};

/// Link state of the session, atomically readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Degraded,
    Faulted,
    Closed,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkState::Connected,
            2 => LinkState::Degraded,
            3 => LinkState::Faulted,
            4 => LinkState::Closed,
            _ => LinkState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LinkState::Disconnected => 0,
            LinkState::Connected => 1,
            LinkState::Degraded => 2,
            LinkState::Faulted => 3,
            LinkState::Closed => 4,
        }
    }
}

/// Health of the outbound heartbeat, judged by the age of the last
/// successful transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatHealth {
    Ok,
    Degraded,
    Failed,
}

/// Typed result of a protection-parameter read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtectionParams {
    VoltageCurrent(ProtectionParams1),
    PowerAcVoltage(ProtectionParams2),
    Frequency(ProtectionParams3),
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Peer address of the PCS on the bus.
    pub pcs_addr: u8,
    /// RX silence before the link degrades.
    pub rx_timeout: Duration,
    /// Wait for a command reply.
    pub command_timeout: Duration,
    /// Heartbeat cadence; must stay well below the 5 s device timeout.
    pub heartbeat_period: Duration,
    /// Snapshot freshness window.
    pub fresh_window: Duration,
    /// Run the heartbeat loop. Disabled only for protocol experiments.
    pub auto_heartbeat: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            pcs_addr: PCS_DEFAULT_ADDR,
            rx_timeout: DEFAULT_RX_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            heartbeat_period: HEARTBEAT_PERIOD,
            fresh_window: DEFAULT_FRESH_WINDOW,
            auto_heartbeat: true,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), PcsError> {
        if self.pcs_addr == CONTROLLER_ADDR {
            return Err(PcsError::InvalidConfig(
                "pcs_addr collides with the controller address 0xB4".into(),
            ));
        }
        if self.pcs_addr == BROADCAST_ADDR {
            return Err(PcsError::InvalidConfig("pcs_addr must not be broadcast".into()));
        }
        if self.heartbeat_period.is_zero() || self.heartbeat_period >= CAN_TIMEOUT {
            return Err(PcsError::InvalidConfig(
                "heartbeat_period must be positive and below the 5 s device timeout".into(),
            ));
        }
        if self.rx_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err(PcsError::InvalidConfig("timeouts must be positive".into()));
        }
        Ok(())
    }
}

struct Shared {
    snapshot: PcsSnapshot,
    last_rx: Option<Instant>,
    /// Single-slot reply registry: key present = request in flight, value
    /// filled by the receive pump.
    waiters: HashMap<u8, Option<RxFrame>>,
    /// Last control-flag vector encoded into PF=0x0F.
    control: ControlFlags,
    heartbeat_data: HeartbeatData,
    last_heartbeat_tx: Option<Instant>,
    heartbeat_failures: u32,
    busoff_times: VecDeque<Instant>,
}

impl Shared {
    fn new() -> Self {
        Shared {
            snapshot: PcsSnapshot::default(),
            last_rx: None,
            waiters: HashMap::new(),
            control: ControlFlags::default(),
            heartbeat_data: HeartbeatData::default(),
            last_heartbeat_tx: None,
            heartbeat_failures: 0,
            busoff_times: VecDeque::new(),
        }
    }
}

type Subscriber = Box<dyn Fn(u8, &RxFrame) + Send>;

struct Inner {
    shared: Mutex<Shared>,
    wakeup: Condvar,
}

/// High-level session over one PCS device.
pub struct PcsSession {
    adapter: Arc<dyn BusAdapter>,
    config: SessionConfig,
    inner: Arc<Inner>,
    state: Arc<AtomicU8>,
    stopping: Arc<AtomicBool>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    pump: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl PcsSession {
    /// Starts the session: spawns the receive pump and (unless disabled)
    /// the heartbeat loop.
    pub fn start(
        adapter: Arc<dyn BusAdapter>,
        config: SessionConfig,
    ) -> Result<PcsSession, PcsError> {
        config.validate()?;

        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared::new()),
            wakeup: Condvar::new(),
        });
        let state = Arc::new(AtomicU8::new(LinkState::Disconnected.as_u8()));
        let stopping = Arc::new(AtomicBool::new(false));
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));

        let pump = {
            let adapter = Arc::clone(&adapter);
            let inner = Arc::clone(&inner);
            let state = Arc::clone(&state);
            let stopping = Arc::clone(&stopping);
            let subscribers = Arc::clone(&subscribers);
            let config = config.clone();
            thread::Builder::new()
                .name("pcs-rx".into())
                .spawn(move || receive_pump(adapter, inner, state, stopping, subscribers, config))
                .map_err(|e| PcsError::InvalidConfig(format!("cannot spawn rx thread: {e}")))?
        };

        let heartbeat = if config.auto_heartbeat {
            let adapter = Arc::clone(&adapter);
            let inner = Arc::clone(&inner);
            let state = Arc::clone(&state);
            let stopping = Arc::clone(&stopping);
            let config = config.clone();
            Some(
                thread::Builder::new()
                    .name("pcs-hb".into())
                    .spawn(move || heartbeat_loop(adapter, inner, state, stopping, config))
                    .map_err(|e| PcsError::InvalidConfig(format!("cannot spawn hb thread: {e}")))?,
            )
        } else {
            None
        };

        info!("PCS session started (pcs_addr=0x{:02X})", config.pcs_addr);
        Ok(PcsSession {
            adapter,
            config,
            inner,
            state,
            stopping,
            subscribers,
            pump: Some(pump),
            heartbeat,
        })
    }

    // -----------------------------------------------------------------------
    // State and snapshot access
    // -----------------------------------------------------------------------

    pub fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Clone of the whole snapshot.
    pub fn snapshot(&self) -> PcsSnapshot {
        self.inner.shared.lock().unwrap().snapshot.clone()
    }

    fn field<T: Copy>(
        &self,
        pick: impl FnOnce(&PcsSnapshot) -> Option<crate::state::Stamped<T>>,
    ) -> Option<FieldReading<T>> {
        let guard = self.inner.shared.lock().unwrap();
        let stamped = pick(&guard.snapshot)?;
        Some(FieldReading::from_stamped(
            &stamped,
            Instant::now(),
            self.config.fresh_window,
        ))
    }

    pub fn dc(&self) -> Option<FieldReading<DcData>> {
        self.field(|s| s.dc)
    }

    pub fn dc_hires(&self) -> Option<FieldReading<HighResDc>> {
        self.field(|s| s.dc_hires)
    }

    pub fn capacity_energy(&self) -> Option<FieldReading<CapacityEnergy>> {
        self.field(|s| s.capacity_energy)
    }

    pub fn status(&self) -> Option<FieldReading<StatusData>> {
        self.field(|s| s.status)
    }

    pub fn grid_voltage(&self) -> Option<FieldReading<GridVoltage>> {
        self.field(|s| s.grid_voltage)
    }

    pub fn grid_current(&self) -> Option<FieldReading<GridCurrent>> {
        self.field(|s| s.grid_current)
    }

    pub fn system_power(&self) -> Option<FieldReading<SystemPower>> {
        self.field(|s| s.system_power)
    }

    /// Latest fault code and its description.
    pub fn fault(&self) -> (u16, String) {
        let code = self
            .status()
            .map(|reading| reading.value.fault_code)
            .unwrap_or(0);
        (code, fault_description(code))
    }

    /// Time since the last decoded inbound frame.
    pub fn since_last_rx(&self) -> Option<Duration> {
        let guard = self.inner.shared.lock().unwrap();
        guard.last_rx.map(|t| t.elapsed())
    }

    /// Time since the last successful heartbeat transmission.
    pub fn heartbeat_age(&self) -> Option<Duration> {
        let guard = self.inner.shared.lock().unwrap();
        guard.last_heartbeat_tx.map(|t| t.elapsed())
    }

    /// Link health judged by heartbeat TX age: degraded above 1 s, failed
    /// above the 5 s device deadline.
    pub fn heartbeat_health(&self) -> HeartbeatHealth {
        match self.heartbeat_age() {
            Some(age) if age > CAN_TIMEOUT => HeartbeatHealth::Failed,
            Some(age) if age > Duration::from_secs(1) => HeartbeatHealth::Degraded,
            Some(_) => HeartbeatHealth::Ok,
            None => HeartbeatHealth::Failed,
        }
    }

    /// Replaces the battery-side mirror values carried by the heartbeat.
    pub fn set_heartbeat_data(&self, data: HeartbeatData) {
        self.inner.shared.lock().unwrap().heartbeat_data = data;
    }

    /// Registers a consumer invoked on the receive-pump thread for every
    /// decoded frame. Callbacks must not block; panics are contained.
    pub fn subscribe(&self, callback: impl Fn(u8, &RxFrame) + Send + 'static) {
        self.subscribers.lock().unwrap().push(Box::new(callback));
    }

    pub fn bus_stats(&self) -> BusStatsSnapshot {
        self.adapter.stats()
    }

    /// Re-opens the bus through the adapter's backoff schedule.
    pub fn reconnect_bus(&self) -> bool {
        self.adapter.reconnect()
    }

    // -----------------------------------------------------------------------
    // Command surface
    // -----------------------------------------------------------------------

    /// Starts the power stage. Succeeds once the device acknowledges and the
    /// running state turns active.
    pub fn enable(&self) -> Result<(), PcsError> {
        let deadline = Instant::now() + self.config.command_timeout;
        self.control_command(ControlAction::Start, deadline)?;
        if !self.wait_for_status(|s| s.state().is_active(), deadline) {
            return Err(PcsError::CommandRejected(
                "no running-state transition after start".into(),
            ));
        }
        info!("PCS enabled");
        Ok(())
    }

    /// Stops the power stage.
    pub fn disable(&self) -> Result<(), PcsError> {
        let deadline = Instant::now() + self.config.command_timeout;
        self.control_command(ControlAction::Stop, deadline)?;
        if !self.wait_for_status(|s| s.state().is_stopped(), deadline) {
            return Err(PcsError::CommandRejected(
                "no running-state transition after stop".into(),
            ));
        }
        info!("PCS disabled");
        Ok(())
    }

    /// Clears a latched fault. On success the session leaves `Faulted`.
    pub fn reset_faults(&self) -> Result<(), PcsError> {
        let deadline = Instant::now() + self.config.command_timeout;
        self.control_command(ControlAction::ClearFaults, deadline)?;
        if !self.wait_for_status(|s| s.fault_code == 0, deadline) {
            return Err(PcsError::CommandRejected("fault code did not clear".into()));
        }
        self.transition(&[LinkState::Faulted], LinkState::Connected);
        info!("PCS faults cleared");
        Ok(())
    }

    /// Programs a working mode. The PCS must be stopped.
    pub fn set_mode(&self, setpoint: &ModeSetpoint) -> Result<(), PcsError> {
        self.ensure_link()?;
        {
            let guard = self.inner.shared.lock().unwrap();
            match guard.snapshot.status {
                Some(stamped) if stamped.value.state().is_stopped() => {}
                Some(_) => return Err(PcsError::ModeChangeWhileRunning),
                None => return Err(PcsError::NotConnected),
            }
        }
        let plan = mode_frame_plan(setpoint)?;
        let deadline = Instant::now() + self.config.command_timeout;
        let reply = self.request(0x0E, &plan, deadline)?;
        self.expect_ack(reply, "mode change refused by device")?;
        info!("working mode set to {}", setpoint.name());
        Ok(())
    }

    /// Reads one protection-parameter page.
    pub fn read_protection_params(&self, page: ProtectionPage) -> Result<ProtectionParams, PcsError> {
        self.ensure_link()?;
        let payload = encode_read_protection_params(page);
        let deadline = Instant::now() + self.config.command_timeout;
        let reply = self.request(page.reply_pf(), &[(0x01, payload)], deadline)?;
        match reply {
            RxFrame::ProtectionParams1(p) => Ok(ProtectionParams::VoltageCurrent(p)),
            RxFrame::ProtectionParams2(p) => Ok(ProtectionParams::PowerAcVoltage(p)),
            RxFrame::ProtectionParams3(p) => Ok(ProtectionParams::Frequency(p)),
            other => Err(PcsError::CommandRejected(format!(
                "unexpected protection reply: {other:?}"
            ))),
        }
    }

    /// Writes DC voltage/current protection limits.
    pub fn set_protection_params1(&self, params: &ProtectionParams1) -> Result<(), PcsError> {
        self.ensure_link()?;
        let payload = encode_set_protection_params1(params)?;
        self.simple_set(0x05, payload, 0x08)
    }

    /// Writes power/AC-voltage protection limits.
    pub fn set_protection_params2(&self, params: &ProtectionParams2) -> Result<(), PcsError> {
        self.ensure_link()?;
        let payload = encode_set_protection_params2(params)?;
        self.simple_set(0x06, payload, 0x08)
    }

    /// Writes frequency protection limits.
    pub fn set_protection_params3(&self, params: &ProtectionParams3) -> Result<(), PcsError> {
        self.ensure_link()?;
        let payload = encode_set_protection_params3(params)?;
        self.simple_set(0x07, payload, 0x08)
    }

    /// Sets the device wall-clock time.
    pub fn set_device_time(&self, time: &DeviceTime) -> Result<(), PcsError> {
        self.ensure_link()?;
        let payload = encode_set_time(time)?;
        self.simple_set(0x09, payload, 0x0A)
    }

    /// Reads the ARM firmware version. The DSP version arrives on the same
    /// query and lands in the snapshot.
    pub fn read_firmware_version(&self) -> Result<VersionInfo, PcsError> {
        self.ensure_link()?;
        let payload = encode_read_special_data(SPECIAL_DATA_VERSIONS)?;
        let deadline = Instant::now() + self.config.command_timeout;
        let reply = self.request(0x34, &[(0x1D, payload)], deadline)?;
        match reply {
            RxFrame::ArmVersion(v) => Ok(v),
            other => Err(PcsError::CommandRejected(format!(
                "unexpected version reply: {other:?}"
            ))),
        }
    }

    /// Reads the active working-mode code.
    pub fn read_working_mode(&self) -> Result<u16, PcsError> {
        self.ensure_link()?;
        let payload = encode_read_special_data(SPECIAL_DATA_WORKING_MODE)?;
        let deadline = Instant::now() + self.config.command_timeout;
        let reply = self.request(0x36, &[(0x1D, payload)], deadline)?;
        match reply {
            RxFrame::WorkingMode(code) => Ok(code),
            other => Err(PcsError::CommandRejected(format!(
                "unexpected mode reply: {other:?}"
            ))),
        }
    }

    /// Closes the session: stops both loops, closes the adapter, and joins
    /// the threads with a deadline. A second close is a no-op.
    pub fn close(&mut self) {
        if self.link_state() == LinkState::Closed {
            return;
        }
        self.state.store(LinkState::Closed.as_u8(), Ordering::SeqCst);
        self.stopping.store(true, Ordering::SeqCst);
        self.adapter.close();
        self.inner.wakeup.notify_all();

        let deadline = Instant::now() + Duration::from_secs(2);
        for handle in [self.pump.take(), self.heartbeat.take()].into_iter().flatten() {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("session thread did not stop within the join deadline");
            }
        }
        info!("PCS session closed");
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_link(&self) -> Result<(), PcsError> {
        match self.link_state() {
            LinkState::Closed | LinkState::Disconnected => Err(PcsError::NotConnected),
            _ => Ok(()),
        }
    }

    fn transition(&self, from: &[LinkState], to: LinkState) -> bool {
        transition(&self.state, from, to)
    }

    fn expect_ack(&self, reply: RxFrame, refusal: &str) -> Result<(), PcsError> {
        match reply {
            RxFrame::SetReply { accepted: true, .. } => Ok(()),
            RxFrame::SetReply { accepted: false, .. } => {
                Err(PcsError::CommandRejected(refusal.to_string()))
            }
            other => Err(PcsError::CommandRejected(format!(
                "unexpected reply: {other:?}"
            ))),
        }
    }

    fn simple_set(&self, pf: u8, payload: [u8; PAYLOAD_LEN], reply_pf: u8) -> Result<(), PcsError> {
        let deadline = Instant::now() + self.config.command_timeout;
        let reply = self.request(reply_pf, &[(pf, payload)], deadline)?;
        self.expect_ack(reply, "set command refused by device")
    }

    fn control_command(&self, action: ControlAction, deadline: Instant) -> Result<(), PcsError> {
        self.ensure_link()?;
        let prev = self.inner.shared.lock().unwrap().control;
        let (payload, next) = encode_start_stop(action, Some(&prev))?;
        let reply = self.request(0x10, &[(0x0F, payload)], deadline)?;
        self.expect_ack(reply, "control command refused by device")?;
        self.inner.shared.lock().unwrap().control = next;
        Ok(())
    }

    /// Registers a single-slot waiter for `reply_pf`, transmits the frames in
    /// order, and waits for the matching reply until `deadline`.
    fn request(
        &self,
        reply_pf: u8,
        frames: &[(u8, [u8; PAYLOAD_LEN])],
        deadline: Instant,
    ) -> Result<RxFrame, PcsError> {
        {
            let mut guard = self.inner.shared.lock().unwrap();
            if guard.waiters.contains_key(&reply_pf) {
                return Err(PcsError::Busy(reply_pf));
            }
            guard.waiters.insert(reply_pf, None);
        }

        for (pf, payload) in frames {
            if let Err(e) = self.send_with_retry(*pf, payload) {
                self.inner.shared.lock().unwrap().waiters.remove(&reply_pf);
                return Err(e);
            }
        }

        let mut guard = self.inner.shared.lock().unwrap();
        loop {
            if matches!(guard.waiters.get(&reply_pf), Some(Some(_))) {
                let frame = guard.waiters.remove(&reply_pf).flatten();
                return Ok(frame.expect("slot was checked full"));
            }
            if self.stopping.load(Ordering::SeqCst) {
                guard.waiters.remove(&reply_pf);
                return Err(PcsError::NotConnected);
            }
            let now = Instant::now();
            if now >= deadline {
                guard.waiters.remove(&reply_pf);
                return Err(PcsError::CommandTimeout(reply_pf));
            }
            let (next_guard, _) = self
                .inner
                .wakeup
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next_guard;
        }
    }

    /// Transmits one frame, retrying exactly once on a transient failure.
    fn send_with_retry(&self, pf: u8, payload: &[u8; PAYLOAD_LEN]) -> Result<(), PcsError> {
        let id = CanId::tx(pf, self.config.pcs_addr).pack();
        match self.adapter.send(id, payload) {
            Ok(()) => Ok(()),
            Err(SendError::Transient(first)) => {
                debug!("transient send failure for PF=0x{pf:02X}, retrying: {first}");
                self.adapter.send(id, payload).map_err(|e| {
                    self.note_send_failure(&e);
                    PcsError::Bus(e)
                })
            }
            Err(e) => {
                self.note_send_failure(&e);
                Err(PcsError::Bus(e))
            }
        }
    }

    fn note_send_failure(&self, error: &SendError) {
        if matches!(error, SendError::BusOff) {
            let mut guard = self.inner.shared.lock().unwrap();
            if note_busoff(&mut guard) {
                drop(guard);
                if self.transition(
                    &[LinkState::Disconnected, LinkState::Connected, LinkState::Degraded],
                    LinkState::Faulted,
                ) {
                    warn!("repeated bus-off, session faulted");
                }
            }
        }
    }

    /// Blocks until the decoded status satisfies `pred` or the deadline
    /// passes.
    fn wait_for_status(&self, pred: impl Fn(&StatusData) -> bool, deadline: Instant) -> bool {
        let mut guard = self.inner.shared.lock().unwrap();
        loop {
            if let Some(stamped) = guard.snapshot.status {
                if pred(&stamped.value) {
                    return true;
                }
            }
            if self.stopping.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next_guard, _) = self
                .inner
                .wakeup
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next_guard;
        }
    }
}

impl Drop for PcsSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn transition(state: &AtomicU8, from: &[LinkState], to: LinkState) -> bool {
    let mut current = state.load(Ordering::SeqCst);
    loop {
        if !from.iter().any(|s| s.as_u8() == current) {
            return false;
        }
        match state.compare_exchange(current, to.as_u8(), Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

/// Sliding 10 s window of bus-off events; three within the window fault the
/// session.
fn note_busoff(shared: &mut Shared) -> bool {
    let now = Instant::now();
    shared.busoff_times.push_back(now);
    while let Some(front) = shared.busoff_times.front() {
        if now.duration_since(*front) > Duration::from_secs(10) {
            shared.busoff_times.pop_front();
        } else {
            break;
        }
    }
    shared.busoff_times.len() >= 3
}

fn receive_pump(
    adapter: Arc<dyn BusAdapter>,
    inner: Arc<Inner>,
    state: Arc<AtomicU8>,
    stopping: Arc<AtomicBool>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    config: SessionConfig,
) {
    while !stopping.load(Ordering::SeqCst) {
        let Some(frame) = adapter.recv(RX_POLL_DEADLINE) else {
            let silent_for = {
                let guard = inner.shared.lock().unwrap();
                guard.last_rx.map(|t| t.elapsed())
            };
            if let Some(age) = silent_for {
                if age > config.rx_timeout
                    && transition(&state, &[LinkState::Connected], LinkState::Degraded)
                {
                    warn!("no inbound frame for {age:?}, link degraded");
                }
            }
            continue;
        };

        let can_id = match CanId::unpack(frame.id) {
            Ok(id) => id,
            Err(e) => {
                debug!("dropping malformed identifier: {e}");
                continue;
            }
        };
        if !can_id.is_from_pcs(config.pcs_addr) {
            debug!("dropping frame with unexpected direction, id=0x{:08X}", frame.id);
            continue;
        }

        let decoded = match decode_rx_frame(can_id.pf, &frame.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("dropping undecodable frame PF=0x{:02X}: {e}", can_id.pf);
                continue;
            }
        };

        {
            let mut guard = inner.shared.lock().unwrap();
            guard.snapshot.apply(&decoded, frame.timestamp);
            guard.last_rx = Some(frame.timestamp);
            if let Some(slot) = guard.waiters.get_mut(&can_id.pf) {
                *slot = Some(decoded.clone());
            }
            inner.wakeup.notify_all();
        }

        if let RxFrame::Status(status) = &decoded {
            if status.fault_code == CAN1_COMM_FAULT
                && transition(
                    &state,
                    &[LinkState::Disconnected, LinkState::Connected, LinkState::Degraded],
                    LinkState::Faulted,
                )
            {
                warn!("PCS latched CAN1 communication fault (0x800D)");
            }
        }
        if transition(
            &state,
            &[LinkState::Disconnected, LinkState::Degraded],
            LinkState::Connected,
        ) {
            info!("link to PCS established");
        }

        let subs = subscribers.lock().unwrap();
        for callback in subs.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(can_id.pf, &decoded))).is_err() {
                warn!("subscriber callback panicked; frame PF=0x{:02X}", can_id.pf);
            }
        }
    }
    debug!("receive pump stopped");
}

fn heartbeat_loop(
    adapter: Arc<dyn BusAdapter>,
    inner: Arc<Inner>,
    state: Arc<AtomicU8>,
    stopping: Arc<AtomicBool>,
    config: SessionConfig,
) {
    let mut next_tick = Instant::now();
    while !stopping.load(Ordering::SeqCst) {
        let payload = {
            let guard = inner.shared.lock().unwrap();
            encode_heartbeat(&guard.heartbeat_data)
        };
        match payload {
            Ok(payload) => {
                let id = CanId::tx(0x1A, config.pcs_addr).pack();
                match adapter.send(id, &payload) {
                    Ok(()) => {
                        let mut guard = inner.shared.lock().unwrap();
                        guard.last_heartbeat_tx = Some(Instant::now());
                        guard.heartbeat_failures = 0;
                    }
                    Err(e) => {
                        warn!("heartbeat send failed: {e}");
                        let faulted = {
                            let mut guard = inner.shared.lock().unwrap();
                            guard.heartbeat_failures += 1;
                            let degraded = guard.heartbeat_failures >= 2;
                            let faulted =
                                matches!(e, SendError::BusOff) && note_busoff(&mut guard);
                            if degraded {
                                transition(&state, &[LinkState::Connected], LinkState::Degraded);
                            }
                            faulted
                        };
                        if faulted {
                            transition(
                                &state,
                                &[
                                    LinkState::Disconnected,
                                    LinkState::Connected,
                                    LinkState::Degraded,
                                ],
                                LinkState::Faulted,
                            );
                        }
                    }
                }
            }
            Err(e) => warn!("heartbeat mirror values out of range, frame skipped: {e}"),
        }

        // Monotonic schedule: the next slot is prev + period. After an
        // overrun the schedule catches up without bursting, and the period
        // is never stretched by send failures.
        next_tick += config.heartbeat_period;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
    debug!("heartbeat loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::virtual_bus::VirtualBus;

    #[test]
    fn config_validation_refuses_controller_address() {
        let config = SessionConfig {
            pcs_addr: CONTROLLER_ADDR,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(PcsError::InvalidConfig(_))));
    }

    #[test]
    fn config_validation_refuses_slow_heartbeat() {
        let config = SessionConfig {
            heartbeat_period: Duration::from_secs(6),
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(PcsError::InvalidConfig(_))));
    }

    #[test]
    fn session_starts_disconnected_and_closes_idempotently() {
        let bus = VirtualBus::new();
        let adapter = Arc::new(bus.endpoint());
        let mut session = PcsSession::start(adapter, SessionConfig::default()).unwrap();
        assert_eq!(session.link_state(), LinkState::Disconnected);
        assert!(matches!(session.enable(), Err(PcsError::NotConnected)));
        session.close();
        session.close();
        assert_eq!(session.link_state(), LinkState::Closed);
    }

    #[test]
    fn transition_respects_source_states() {
        let state = AtomicU8::new(LinkState::Faulted.as_u8());
        assert!(!transition(
            &state,
            &[LinkState::Disconnected, LinkState::Degraded],
            LinkState::Connected
        ));
        assert_eq!(
            LinkState::from_u8(state.load(Ordering::SeqCst)),
            LinkState::Faulted
        );
    }
}
