//! # PCS Frame Codec
//!
//! Encoders and decoders for the application payloads carried in the 29-bit
//! extended frames. Every payload is exactly 8 bytes with zero-filled tails;
//! all multi-byte fields are big-endian. Scale divisors convert raw integers
//! to engineering units on decode and are inverted with round-to-nearest on
//! encode.
//!
//! Decoders guard the payload length before reading and fail with
//! [`PcsError::TruncatedFrame`]; encoders fail with [`PcsError::OutOfRange`]
//! when an engineering value does not fit the raw integer after scaling.
//!
//! Inbound dispatch goes through [`decode_rx_frame`], a static PF-keyed
//! table of tagged decoder variants: adding a PF means adding a row.

use serde::{Deserialize, Serialize};

use crate::error::PcsError;
use crate::protocol::mode::ModeSetpoint;
use crate::protocol::status::StatusData;

pub const PAYLOAD_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn guard(pf: u8, data: &[u8], need: usize) -> Result<(), PcsError> {
    if data.len() < need {
        return Err(PcsError::TruncatedFrame {
            pf,
            have: data.len(),
            need,
        });
    }
    Ok(())
}

fn u16_at(data: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([data[off], data[off + 1]])
}

fn i16_at(data: &[u8], off: usize) -> i16 {
    i16::from_be_bytes([data[off], data[off + 1]])
}

fn u32_at(data: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn i32_at(data: &[u8], off: usize) -> i32 {
    i32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn put_u16(buf: &mut [u8; PAYLOAD_LEN], off: usize, value: u16) {
    buf[off..off + 2].copy_from_slice(&value.to_be_bytes());
}

fn put_i16(buf: &mut [u8; PAYLOAD_LEN], off: usize, value: i16) {
    buf[off..off + 2].copy_from_slice(&value.to_be_bytes());
}

fn put_u32(buf: &mut [u8; PAYLOAD_LEN], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_be_bytes());
}

fn put_i32(buf: &mut [u8; PAYLOAD_LEN], off: usize, value: i32) {
    buf[off..off + 4].copy_from_slice(&value.to_be_bytes());
}

/// Scales an engineering value into an unsigned 16-bit raw integer.
fn enc_u16(pf: u8, field: &'static str, value: f64, divisor: f64) -> Result<u16, PcsError> {
    let raw = (value * divisor).round();
    if !raw.is_finite() || !(0.0..=65535.0).contains(&raw) {
        return Err(PcsError::OutOfRange { pf, field });
    }
    Ok(raw as u16)
}

fn enc_i16(pf: u8, field: &'static str, value: f64, divisor: f64) -> Result<i16, PcsError> {
    let raw = (value * divisor).round();
    if !raw.is_finite() || raw < i16::MIN as f64 || raw > i16::MAX as f64 {
        return Err(PcsError::OutOfRange { pf, field });
    }
    Ok(raw as i16)
}

fn enc_u32(pf: u8, field: &'static str, value: f64, divisor: f64) -> Result<u32, PcsError> {
    let raw = (value * divisor).round();
    if !raw.is_finite() || raw < 0.0 || raw > u32::MAX as f64 {
        return Err(PcsError::OutOfRange { pf, field });
    }
    Ok(raw as u32)
}

// ---------------------------------------------------------------------------
// Typed records
// ---------------------------------------------------------------------------

/// Protection parameter page selector (PF=0x01 query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionPage {
    /// DC voltage and current limits (reply PF=0x02).
    VoltageCurrent,
    /// Power and AC voltage limits (reply PF=0x03).
    PowerAcVoltage,
    /// Frequency limits (reply PF=0x04).
    Frequency,
}

impl ProtectionPage {
    pub fn code(&self) -> u8 {
        match self {
            ProtectionPage::VoltageCurrent => 0x01,
            ProtectionPage::PowerAcVoltage => 0x02,
            ProtectionPage::Frequency => 0x03,
        }
    }

    pub fn reply_pf(&self) -> u8 {
        match self {
            ProtectionPage::VoltageCurrent => 0x02,
            ProtectionPage::PowerAcVoltage => 0x03,
            ProtectionPage::Frequency => 0x04,
        }
    }
}

/// DC voltage and current limits (PF=0x02 reply / PF=0x05 set).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionParams1 {
    pub max_output_voltage: f64,
    pub min_output_voltage: f64,
    pub max_charge_current: f64,
    pub max_discharge_current: f64,
}

/// Power and AC voltage limits (PF=0x03 reply / PF=0x06 set).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionParams2 {
    pub max_charge_power: f64,
    pub max_discharge_power: f64,
    pub ac_voltage_upper: f64,
    pub ac_voltage_lower: f64,
}

/// Frequency limits (PF=0x04 reply / PF=0x07 set).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionParams3 {
    pub discharge_freq_upper: f64,
    pub charge_freq_lower: f64,
    pub ac_freq_upper: f64,
    pub ac_freq_lower: f64,
}

/// Device wall-clock time (PF=0x09).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Real-time DC measurements (PF=0x11). Negative current/power = charging.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DcData {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub inlet_temperature: f64,
}

/// Accumulated capacity and energy (PF=0x12).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CapacityEnergy {
    pub capacity: f64,
    pub energy: f64,
    pub outlet_temperature: f64,
}

/// Three-phase grid voltages (PF=0x14).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridVoltage {
    pub u_voltage: f64,
    pub v_voltage: f64,
    pub w_voltage: f64,
}

/// Three-phase grid currents plus power factor (PF=0x15).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridCurrent {
    pub u_current: f64,
    pub v_current: f64,
    pub w_current: f64,
    pub power_factor: f64,
}

/// System power data (PF=0x16).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemPower {
    pub active_power: f64,
    pub reactive_power: f64,
    pub apparent_power: f64,
    pub frequency: f64,
}

/// Three-phase load voltages (PF=0x17).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadVoltage {
    pub u_voltage: f64,
    pub v_voltage: f64,
    pub w_voltage: f64,
}

/// Three-phase load currents (PF=0x18).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadCurrent {
    pub u_current: f64,
    pub v_current: f64,
    pub w_current: f64,
}

/// Load-side power data (PF=0x19).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadPower {
    pub active_power: f64,
    pub reactive_power: f64,
    pub apparent_power: f64,
}

/// IO signals and AD sample voltages (PF=0x20).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IoAd {
    pub io1: u8,
    pub io2: u8,
    pub io3: u8,
    pub io4: u8,
    pub ad1_voltage: f64,
    pub ad2_voltage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseLabel {
    A,
    B,
    C,
}

/// Per-phase power data (PF=0x23/0x24/0x25).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasePower {
    pub phase: PhaseLabel,
    pub active_power: f64,
    pub reactive_power: f64,
    pub apparent_power: f64,
}

/// Hardware/software version triplets (PF=0x34 ARM / PF=0x35 DSP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    pub hw_v: u8,
    pub hw_b: u8,
    pub hw_d: u8,
    pub sw_v: u8,
    pub sw_b: u8,
    pub sw_d: u8,
}

/// High-resolution DC measurements (PF=0x39).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HighResDc {
    pub voltage: f64,
    pub current: f64,
}

/// Heartbeat mirror state: battery side is shut down.
pub const HEARTBEAT_STATE_SHUTDOWN: u8 = 0x01;
/// Heartbeat mirror state: battery side is running (default).
pub const HEARTBEAT_STATE_RUNNING: u8 = 0x02;
/// Heartbeat mirror state: battery side reports a fault.
pub const HEARTBEAT_STATE_FAULT: u8 = 0x03;

/// External-device data carried in the heartbeat (PF=0x1A). The PCS treats
/// the frame solely as a liveness signal; zero values are valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub dc_voltage: f64,
    pub dc_current: f64,
    pub mirror_state: u8,
}

impl Default for HeartbeatData {
    fn default() -> Self {
        HeartbeatData {
            dc_voltage: 0.0,
            dc_current: 0.0,
            mirror_state: HEARTBEAT_STATE_RUNNING,
        }
    }
}

/// Control-flag vector carried in PF=0x0F. When one flag changes, the others
/// must keep the values of the previous vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlFlags {
    pub start: bool,
    pub clear_fault: bool,
    pub auto_start: bool,
}

/// Single mutation applied over the previous control vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    ClearFaults,
    AutoStart(bool),
}

impl ControlFlags {
    /// Overlays one requested change, carrying the other flags over.
    pub fn apply(&self, action: ControlAction) -> ControlFlags {
        let mut next = *self;
        match action {
            ControlAction::Start => {
                next.start = true;
                next.clear_fault = false;
            }
            ControlAction::Stop => {
                next.start = false;
                next.clear_fault = false;
            }
            ControlAction::ClearFaults => {
                next.start = false;
                next.clear_fault = true;
            }
            ControlAction::AutoStart(enabled) => next.auto_start = enabled,
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Encoders (controller -> PCS)
// ---------------------------------------------------------------------------

/// PF=0x01: query one protection parameter page.
pub fn encode_read_protection_params(page: ProtectionPage) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = page.code();
    buf
}

/// PF=0x05: set DC voltage/current limits.
pub fn encode_set_protection_params1(p: &ProtectionParams1) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x05, "max_output_voltage", p.max_output_voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x05, "min_output_voltage", p.min_output_voltage, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x05, "max_charge_current", p.max_charge_current, 10.0)?);
    put_u16(&mut buf, 6, enc_u16(0x05, "max_discharge_current", p.max_discharge_current, 10.0)?);
    Ok(buf)
}

/// PF=0x06: set power and AC voltage limits.
pub fn encode_set_protection_params2(p: &ProtectionParams2) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x06, "max_charge_power", p.max_charge_power, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x06, "max_discharge_power", p.max_discharge_power, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x06, "ac_voltage_upper", p.ac_voltage_upper, 10.0)?);
    put_u16(&mut buf, 6, enc_u16(0x06, "ac_voltage_lower", p.ac_voltage_lower, 10.0)?);
    Ok(buf)
}

/// PF=0x07: set frequency limits.
pub fn encode_set_protection_params3(p: &ProtectionParams3) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x07, "discharge_freq_upper", p.discharge_freq_upper, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x07, "charge_freq_lower", p.charge_freq_lower, 10.0)?);
    let upper = enc_u16(0x07, "ac_freq_upper", p.ac_freq_upper, 1.0)?;
    let lower = enc_u16(0x07, "ac_freq_lower", p.ac_freq_lower, 1.0)?;
    if upper > 0xFF {
        return Err(PcsError::OutOfRange { pf: 0x07, field: "ac_freq_upper" });
    }
    if lower > 0xFF {
        return Err(PcsError::OutOfRange { pf: 0x07, field: "ac_freq_lower" });
    }
    buf[4] = upper as u8;
    buf[5] = lower as u8;
    Ok(buf)
}

/// PF=0x09: set the device wall-clock time.
pub fn encode_set_time(t: &DeviceTime) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if !(1..=12).contains(&t.month) {
        return Err(PcsError::OutOfRange { pf: 0x09, field: "month" });
    }
    if !(1..=31).contains(&t.day) {
        return Err(PcsError::OutOfRange { pf: 0x09, field: "day" });
    }
    if t.hour > 23 {
        return Err(PcsError::OutOfRange { pf: 0x09, field: "hour" });
    }
    if t.minute > 59 {
        return Err(PcsError::OutOfRange { pf: 0x09, field: "minute" });
    }
    if t.second > 59 {
        return Err(PcsError::OutOfRange { pf: 0x09, field: "second" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, t.year);
    buf[2] = t.month;
    buf[3] = t.day;
    buf[4] = t.hour;
    buf[5] = t.minute;
    buf[6] = t.second;
    Ok(buf)
}

/// PF=0x0B: select the working mode; carries the mode code and the first
/// parameter. Parameters 2-4 follow in PF=0x0C/0x0D.
pub fn encode_set_mode(setpoint: &ModeSetpoint) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let raw = setpoint.raw_params()?;
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, setpoint.code());
    put_i32(&mut buf, 2, raw[0]);
    Ok(buf)
}

/// PF=0x0C: mode parameters 2 and 3.
pub fn encode_mode_params23(setpoint: &ModeSetpoint) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let raw = setpoint.raw_params()?;
    let mut buf = [0u8; PAYLOAD_LEN];
    put_i32(&mut buf, 0, raw[1]);
    put_i32(&mut buf, 4, raw[2]);
    Ok(buf)
}

/// PF=0x0D: mode parameter 4.
pub fn encode_mode_param4(setpoint: &ModeSetpoint) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let raw = setpoint.raw_params()?;
    let mut buf = [0u8; PAYLOAD_LEN];
    put_i32(&mut buf, 0, raw[3]);
    Ok(buf)
}

/// The frames (PF, payload) required to program a setpoint, in send order.
pub fn mode_frame_plan(setpoint: &ModeSetpoint) -> Result<Vec<(u8, [u8; PAYLOAD_LEN])>, PcsError> {
    let code = setpoint.code();
    let specs = ModeSetpoint::param_specs(code).ok_or(PcsError::UnknownMode(code))?;
    let mut plan = vec![(0x0B, encode_set_mode(setpoint)?)];
    if specs.len() > 1 {
        plan.push((0x0C, encode_mode_params23(setpoint)?));
    }
    if specs.len() > 3 {
        plan.push((0x0D, encode_mode_param4(setpoint)?));
    }
    Ok(plan)
}

/// PF=0x0F: start/stop/clear-fault control. Requires the previous control
/// vector so unchanged flags carry over; returns the payload together with
/// the vector that was encoded.
pub fn encode_start_stop(
    action: ControlAction,
    prev: Option<&ControlFlags>,
) -> Result<([u8; PAYLOAD_LEN], ControlFlags), PcsError> {
    let prev = prev.ok_or(PcsError::MissingContextForControl)?;
    let next = prev.apply(action);
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = next.start as u8;
    buf[1] = next.clear_fault as u8;
    buf[2] = next.auto_start as u8;
    Ok((buf, next))
}

/// PF=0x1A: heartbeat with battery-side mirror values. With the default
/// (zero) data this emits the documented fill `00 00 27 10 02 00 00 00`.
pub fn encode_heartbeat(hb: &HeartbeatData) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x1A, "dc_voltage", hb.dc_voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x1A, "dc_current", hb.dc_current + 1000.0, 10.0)?);
    buf[4] = hb.mirror_state;
    Ok(buf)
}

/// PF=0x1B: set bus voltage and reactive power.
pub fn encode_set_bus_voltage_reactive(
    bus_voltage: f64,
    reactive_power: f64,
) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x1B, "bus_voltage", bus_voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x1B, "reactive_power", reactive_power, 10.0)?);
    Ok(buf)
}

/// Special-data query type: version information (replies PF=0x34/0x35).
pub const SPECIAL_DATA_VERSIONS: u8 = 0x0A;
/// Special-data query type: current working mode (reply PF=0x36).
pub const SPECIAL_DATA_WORKING_MODE: u8 = 0x0B;

/// PF=0x1D: read special data from the PCS (types 0x01-0x0B).
pub fn encode_read_special_data(data_type: u8) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if !(0x01..=0x0B).contains(&data_type) {
        return Err(PcsError::OutOfRange { pf: 0x1D, field: "data_type" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = data_type;
    Ok(buf)
}

/// PF=0x1F: set the four IO outputs.
pub fn encode_set_io(io1: bool, io2: bool, io3: bool, io4: bool) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = io1 as u8;
    buf[1] = io2 as u8;
    buf[2] = io3 as u8;
    buf[3] = io4 as u8;
    buf
}

/// PF=0x21: set per-phase active power (kW).
pub fn encode_set_phase_power(
    phase_a: f64,
    phase_b: f64,
    phase_c: f64,
) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x21, "phase_a", phase_a, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x21, "phase_b", phase_b, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x21, "phase_c", phase_c, 10.0)?);
    Ok(buf)
}

/// PF=0x26: enable or disable split-phase power control.
pub fn encode_set_split_phase_enable(enable: bool) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = enable as u8;
    buf
}

/// PF=0x28: inverter phase selection (7=A-host .. 12=C-slave).
pub fn encode_set_inverter_phase(phase: u8) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if !(7..=12).contains(&phase) {
        return Err(PcsError::OutOfRange { pf: 0x28, field: "phase" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = phase;
    Ok(buf)
}

/// PF=0x2A: reactive-power control mode (0=reactive power, 1=power factor).
pub fn encode_set_reactive_control(
    mode: u8,
    power_factor: f64,
) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if mode > 1 {
        return Err(PcsError::OutOfRange { pf: 0x2A, field: "mode" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = mode;
    put_i16(&mut buf, 1, enc_i16(0x2A, "power_factor", power_factor, 1000.0)?);
    Ok(buf)
}

/// PF=0x2C: on/off-grid mode (0=disable, 1=automatic switching).
pub fn encode_set_grid_mode(mode: u8) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if mode > 1 {
        return Err(PcsError::OutOfRange { pf: 0x2C, field: "mode" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = mode;
    Ok(buf)
}

/// PF=0x2E: module parallel role (0=single, 1=host, 2=slave), module count
/// (1-10), and Hall sensor ratio.
pub fn encode_set_module_parallel(
    role: u8,
    num_modules: u8,
    hall_ratio: u16,
) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    if role > 2 {
        return Err(PcsError::OutOfRange { pf: 0x2E, field: "role" });
    }
    if !(1..=10).contains(&num_modules) {
        return Err(PcsError::OutOfRange { pf: 0x2E, field: "num_modules" });
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = role;
    buf[1] = num_modules;
    put_u16(&mut buf, 2, hall_ratio);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Encoders for PCS-side frames (used by the simulator and golden tests)
// ---------------------------------------------------------------------------

/// PF=0x11: real-time DC data.
pub fn encode_dc_data(d: &DcData) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x11, "voltage", d.voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x11, "current", d.current + 1000.0, 10.0)?);
    put_i16(&mut buf, 4, enc_i16(0x11, "power", d.power, 10.0)?);
    put_u16(&mut buf, 6, enc_u16(0x11, "inlet_temperature", d.inlet_temperature + 50.0, 10.0)?);
    Ok(buf)
}

/// PF=0x12: capacity and energy.
pub fn encode_capacity_energy(c: &CapacityEnergy) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x12, "capacity", c.capacity, 10.0)?);
    put_u32(&mut buf, 2, enc_u32(0x12, "energy", c.energy, 10.0)?);
    put_u16(&mut buf, 6, enc_u16(0x12, "outlet_temperature", c.outlet_temperature + 50.0, 10.0)?);
    Ok(buf)
}

/// PF=0x13: running state and fault code.
pub fn encode_status(s: &StatusData) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, s.running_state);
    put_u16(&mut buf, 2, s.fault_code);
    buf
}

/// PF=0x14: grid-side three-phase voltages.
pub fn encode_grid_voltage(g: &GridVoltage) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x14, "u_voltage", g.u_voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x14, "v_voltage", g.v_voltage, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x14, "w_voltage", g.w_voltage, 10.0)?);
    Ok(buf)
}

/// PF=0x15: grid-side three-phase currents plus power factor.
pub fn encode_grid_current(g: &GridCurrent) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x15, "u_current", g.u_current, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x15, "v_current", g.v_current, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x15, "w_current", g.w_current, 10.0)?);
    put_i16(&mut buf, 6, enc_i16(0x15, "power_factor", g.power_factor, 10.0)?);
    Ok(buf)
}

/// PF=0x16: system power data.
pub fn encode_system_power(s: &SystemPower) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x16, "active_power", s.active_power, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x16, "reactive_power", s.reactive_power, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x16, "apparent_power", s.apparent_power, 10.0)?);
    put_u16(&mut buf, 6, enc_u16(0x16, "frequency", s.frequency, 10.0)?);
    Ok(buf)
}

/// PF=0x17: load-side three-phase voltages.
pub fn encode_load_voltage(l: &LoadVoltage) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x17, "u_voltage", l.u_voltage, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x17, "v_voltage", l.v_voltage, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x17, "w_voltage", l.w_voltage, 10.0)?);
    Ok(buf)
}

/// PF=0x18: load-side three-phase currents.
pub fn encode_load_current(l: &LoadCurrent) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x18, "u_current", l.u_current, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x18, "v_current", l.v_current, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x18, "w_current", l.w_current, 10.0)?);
    Ok(buf)
}

/// PF=0x19: load-side power data.
pub fn encode_load_power(l: &LoadPower) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x19, "active_power", l.active_power, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x19, "reactive_power", l.reactive_power, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x19, "apparent_power", l.apparent_power, 10.0)?);
    Ok(buf)
}

/// PF=0x20: IO signals and AD sample voltages.
pub fn encode_io_ad(io: &IoAd) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = io.io1;
    buf[1] = io.io2;
    buf[2] = io.io3;
    buf[3] = io.io4;
    put_u16(&mut buf, 4, enc_u16(0x20, "ad1_voltage", io.ad1_voltage, 1000.0)?);
    put_u16(&mut buf, 6, enc_u16(0x20, "ad2_voltage", io.ad2_voltage, 1000.0)?);
    Ok(buf)
}

/// PF=0x23/0x24/0x25: per-phase power data.
pub fn encode_phase_power(p: &PhasePower) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u16(&mut buf, 0, enc_u16(0x23, "active_power", p.active_power, 10.0)?);
    put_u16(&mut buf, 2, enc_u16(0x23, "reactive_power", p.reactive_power, 10.0)?);
    put_u16(&mut buf, 4, enc_u16(0x23, "apparent_power", p.apparent_power, 10.0)?);
    Ok(buf)
}

/// PF=0x34/0x35: version information.
pub fn encode_version(v: &VersionInfo) -> [u8; PAYLOAD_LEN] {
    [v.hw_v, v.hw_b, v.hw_d, v.sw_v, v.sw_b, v.sw_d, 0, 0]
}

/// PF=0x39: high-resolution DC data.
pub fn encode_high_res_dc(d: &HighResDc) -> Result<[u8; PAYLOAD_LEN], PcsError> {
    let mut buf = [0u8; PAYLOAD_LEN];
    put_u32(&mut buf, 0, enc_u32(0x39, "voltage", d.voltage, 1000.0)?);
    put_u32(&mut buf, 4, enc_u32(0x39, "current", d.current + 1000.0, 1000.0)?);
    Ok(buf)
}

/// Generic acknowledgement payload for set-command replies.
pub fn encode_set_reply(accepted: bool) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[0] = accepted as u8;
    buf
}

// ---------------------------------------------------------------------------
// Decoders (PCS -> controller)
// ---------------------------------------------------------------------------

/// PF=0x02 (also the PF=0x05 set payload): DC voltage/current limits.
pub fn decode_protection_params1(data: &[u8]) -> Result<ProtectionParams1, PcsError> {
    guard(0x02, data, 8)?;
    Ok(ProtectionParams1 {
        max_output_voltage: u16_at(data, 0) as f64 / 10.0,
        min_output_voltage: u16_at(data, 2) as f64 / 10.0,
        max_charge_current: u16_at(data, 4) as f64 / 10.0,
        max_discharge_current: u16_at(data, 6) as f64 / 10.0,
    })
}

/// PF=0x03: power and AC voltage limits.
pub fn decode_protection_params2(data: &[u8]) -> Result<ProtectionParams2, PcsError> {
    guard(0x03, data, 8)?;
    Ok(ProtectionParams2 {
        max_charge_power: u16_at(data, 0) as f64 / 10.0,
        max_discharge_power: u16_at(data, 2) as f64 / 10.0,
        ac_voltage_upper: u16_at(data, 4) as f64 / 10.0,
        ac_voltage_lower: u16_at(data, 6) as f64 / 10.0,
    })
}

/// PF=0x04: frequency limits.
pub fn decode_protection_params3(data: &[u8]) -> Result<ProtectionParams3, PcsError> {
    guard(0x04, data, 6)?;
    Ok(ProtectionParams3 {
        discharge_freq_upper: u16_at(data, 0) as f64 / 10.0,
        charge_freq_lower: u16_at(data, 2) as f64 / 10.0,
        ac_freq_upper: data[4] as f64,
        ac_freq_lower: data[5] as f64,
    })
}

/// Set-command reply: accepted iff `data[0] == 0x01` or, for replies that
/// carry an echo byte first, `data[1] == 0x01`. An empty payload decodes as
/// not-acknowledged.
pub fn decode_set_reply(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    data[0] == 0x01 || (data.len() >= 2 && data[1] == 0x01)
}

/// PF=0x0B payload: mode code and first raw parameter.
pub fn decode_set_mode(data: &[u8]) -> Result<(u16, i32), PcsError> {
    guard(0x0B, data, 6)?;
    Ok((u16_at(data, 0), i32_at(data, 2)))
}

/// PF=0x0C/0x0D payload: a pair of raw mode parameters.
pub fn decode_mode_params(pf: u8, data: &[u8]) -> Result<(i32, i32), PcsError> {
    guard(pf, data, 8)?;
    Ok((i32_at(data, 0), i32_at(data, 4)))
}

/// PF=0x0F payload: control-flag vector.
pub fn decode_start_stop(data: &[u8]) -> Result<ControlFlags, PcsError> {
    guard(0x0F, data, 3)?;
    Ok(ControlFlags {
        start: data[0] != 0,
        clear_fault: data[1] != 0,
        auto_start: data[2] != 0,
    })
}

/// PF=0x1A payload: heartbeat mirror values.
pub fn decode_heartbeat(data: &[u8]) -> Result<HeartbeatData, PcsError> {
    guard(0x1A, data, 5)?;
    Ok(HeartbeatData {
        dc_voltage: u16_at(data, 0) as f64 / 10.0,
        dc_current: u16_at(data, 2) as f64 / 10.0 - 1000.0,
        mirror_state: data[4],
    })
}

/// PF=0x11: real-time DC data. Power is signed; negative means charging.
pub fn decode_dc_data(data: &[u8]) -> Result<DcData, PcsError> {
    guard(0x11, data, 8)?;
    Ok(DcData {
        voltage: u16_at(data, 0) as f64 / 10.0,
        current: u16_at(data, 2) as f64 / 10.0 - 1000.0,
        power: i16_at(data, 4) as f64 / 10.0,
        inlet_temperature: u16_at(data, 6) as f64 / 10.0 - 50.0,
    })
}

/// PF=0x12: capacity and energy.
pub fn decode_capacity_energy(data: &[u8]) -> Result<CapacityEnergy, PcsError> {
    guard(0x12, data, 8)?;
    Ok(CapacityEnergy {
        capacity: u16_at(data, 0) as f64 / 10.0,
        energy: u32_at(data, 2) as f64 / 10.0,
        outlet_temperature: u16_at(data, 6) as f64 / 10.0 - 50.0,
    })
}

/// PF=0x13: running state and fault code (both 16-bit).
pub fn decode_status(data: &[u8]) -> Result<StatusData, PcsError> {
    guard(0x13, data, 4)?;
    Ok(StatusData {
        running_state: u16_at(data, 0),
        fault_code: u16_at(data, 2),
    })
}

/// PF=0x14: grid-side three-phase voltages.
pub fn decode_grid_voltage(data: &[u8]) -> Result<GridVoltage, PcsError> {
    guard(0x14, data, 6)?;
    Ok(GridVoltage {
        u_voltage: u16_at(data, 0) as f64 / 10.0,
        v_voltage: u16_at(data, 2) as f64 / 10.0,
        w_voltage: u16_at(data, 4) as f64 / 10.0,
    })
}

/// PF=0x15: grid-side three-phase currents plus power factor.
pub fn decode_grid_current(data: &[u8]) -> Result<GridCurrent, PcsError> {
    guard(0x15, data, 8)?;
    Ok(GridCurrent {
        u_current: u16_at(data, 0) as f64 / 10.0,
        v_current: u16_at(data, 2) as f64 / 10.0,
        w_current: u16_at(data, 4) as f64 / 10.0,
        power_factor: i16_at(data, 6) as f64 / 10.0,
    })
}

/// PF=0x16: system power data.
pub fn decode_system_power(data: &[u8]) -> Result<SystemPower, PcsError> {
    guard(0x16, data, 8)?;
    Ok(SystemPower {
        active_power: u16_at(data, 0) as f64 / 10.0,
        reactive_power: u16_at(data, 2) as f64 / 10.0,
        apparent_power: u16_at(data, 4) as f64 / 10.0,
        frequency: u16_at(data, 6) as f64 / 10.0,
    })
}

/// PF=0x17: load-side three-phase voltages.
pub fn decode_load_voltage(data: &[u8]) -> Result<LoadVoltage, PcsError> {
    guard(0x17, data, 6)?;
    Ok(LoadVoltage {
        u_voltage: u16_at(data, 0) as f64 / 10.0,
        v_voltage: u16_at(data, 2) as f64 / 10.0,
        w_voltage: u16_at(data, 4) as f64 / 10.0,
    })
}

/// PF=0x18: load-side three-phase currents.
pub fn decode_load_current(data: &[u8]) -> Result<LoadCurrent, PcsError> {
    guard(0x18, data, 6)?;
    Ok(LoadCurrent {
        u_current: u16_at(data, 0) as f64 / 10.0,
        v_current: u16_at(data, 2) as f64 / 10.0,
        w_current: u16_at(data, 4) as f64 / 10.0,
    })
}

/// PF=0x19: load-side power data.
pub fn decode_load_power(data: &[u8]) -> Result<LoadPower, PcsError> {
    guard(0x19, data, 6)?;
    Ok(LoadPower {
        active_power: u16_at(data, 0) as f64 / 10.0,
        reactive_power: u16_at(data, 2) as f64 / 10.0,
        apparent_power: u16_at(data, 4) as f64 / 10.0,
    })
}

/// PF=0x20: IO signals and AD sample voltages.
pub fn decode_io_ad(data: &[u8]) -> Result<IoAd, PcsError> {
    guard(0x20, data, 8)?;
    Ok(IoAd {
        io1: data[0],
        io2: data[1],
        io3: data[2],
        io4: data[3],
        ad1_voltage: u16_at(data, 4) as f64 / 1000.0,
        ad2_voltage: u16_at(data, 6) as f64 / 1000.0,
    })
}

/// PF=0x23/0x24/0x25: per-phase power data.
pub fn decode_phase_power(data: &[u8], phase: PhaseLabel) -> Result<PhasePower, PcsError> {
    let pf = match phase {
        PhaseLabel::A => 0x23,
        PhaseLabel::B => 0x24,
        PhaseLabel::C => 0x25,
    };
    guard(pf, data, 6)?;
    Ok(PhasePower {
        phase,
        active_power: u16_at(data, 0) as f64 / 10.0,
        reactive_power: u16_at(data, 2) as f64 / 10.0,
        apparent_power: u16_at(data, 4) as f64 / 10.0,
    })
}

/// PF=0x34/0x35: version information.
pub fn decode_version(pf: u8, data: &[u8]) -> Result<VersionInfo, PcsError> {
    guard(pf, data, 6)?;
    Ok(VersionInfo {
        hw_v: data[0],
        hw_b: data[1],
        hw_d: data[2],
        sw_v: data[3],
        sw_b: data[4],
        sw_d: data[5],
    })
}

/// PF=0x36: working-mode readback.
pub fn decode_working_mode_reply(data: &[u8]) -> Result<u16, PcsError> {
    guard(0x36, data, 2)?;
    Ok(u16_at(data, 0))
}

/// PF=0x39: high-resolution DC data.
pub fn decode_high_res_dc(data: &[u8]) -> Result<HighResDc, PcsError> {
    guard(0x39, data, 8)?;
    Ok(HighResDc {
        voltage: u32_at(data, 0) as f64 / 1000.0,
        current: u32_at(data, 4) as f64 / 1000.0 - 1000.0,
    })
}

// ---------------------------------------------------------------------------
// Inbound dispatch
// ---------------------------------------------------------------------------

/// Tagged union of every decodable PCS-to-controller frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", content = "fields")]
pub enum RxFrame {
    ProtectionParams1(ProtectionParams1),
    ProtectionParams2(ProtectionParams2),
    ProtectionParams3(ProtectionParams3),
    SetReply { pf: u8, accepted: bool },
    Dc(DcData),
    CapacityEnergy(CapacityEnergy),
    Status(StatusData),
    GridVoltage(GridVoltage),
    GridCurrent(GridCurrent),
    SystemPower(SystemPower),
    LoadVoltage(LoadVoltage),
    LoadCurrent(LoadCurrent),
    LoadPower(LoadPower),
    IoAd(IoAd),
    PhasePower(PhasePower),
    ArmVersion(VersionInfo),
    DspVersion(VersionInfo),
    WorkingMode(u16),
    ModeParams { pf: u8, param_a: i32, param_b: i32 },
    HighResDc(HighResDc),
}

/// Decodes an inbound frame by PF. One row per PF; unmapped PFs fail with
/// [`PcsError::UnknownPf`].
pub fn decode_rx_frame(pf: u8, data: &[u8]) -> Result<RxFrame, PcsError> {
    let frame = match pf {
        0x02 => RxFrame::ProtectionParams1(decode_protection_params1(data)?),
        0x03 => RxFrame::ProtectionParams2(decode_protection_params2(data)?),
        0x04 => RxFrame::ProtectionParams3(decode_protection_params3(data)?),
        0x08 | 0x0A | 0x0E | 0x10 | 0x1C | 0x27 | 0x29 | 0x2B | 0x2D | 0x2F | 0x31 | 0x33 => {
            RxFrame::SetReply {
                pf,
                accepted: decode_set_reply(data),
            }
        }
        0x11 => RxFrame::Dc(decode_dc_data(data)?),
        0x12 => RxFrame::CapacityEnergy(decode_capacity_energy(data)?),
        0x13 => RxFrame::Status(decode_status(data)?),
        0x14 => RxFrame::GridVoltage(decode_grid_voltage(data)?),
        0x15 => RxFrame::GridCurrent(decode_grid_current(data)?),
        0x16 => RxFrame::SystemPower(decode_system_power(data)?),
        0x17 => RxFrame::LoadVoltage(decode_load_voltage(data)?),
        0x18 => RxFrame::LoadCurrent(decode_load_current(data)?),
        0x19 => RxFrame::LoadPower(decode_load_power(data)?),
        0x20 => RxFrame::IoAd(decode_io_ad(data)?),
        0x23 => RxFrame::PhasePower(decode_phase_power(data, PhaseLabel::A)?),
        0x24 => RxFrame::PhasePower(decode_phase_power(data, PhaseLabel::B)?),
        0x25 => RxFrame::PhasePower(decode_phase_power(data, PhaseLabel::C)?),
        0x34 => RxFrame::ArmVersion(decode_version(0x34, data)?),
        0x35 => RxFrame::DspVersion(decode_version(0x35, data)?),
        0x36 => RxFrame::WorkingMode(decode_working_mode_reply(data)?),
        0x37 | 0x38 => {
            let (param_a, param_b) = decode_mode_params(pf, data)?;
            RxFrame::ModeParams { pf, param_a, param_b }
        }
        0x39 => RxFrame::HighResDc(decode_high_res_dc(data)?),
        other => return Err(PcsError::UnknownPf(other)),
    };
    Ok(frame)
}

/// Every RX PF with a decoder row, paired with the minimum payload length it
/// accepts. Used by the length-guard tests.
pub const RX_PF_MIN_LEN: &[(u8, usize)] = &[
    (0x02, 8),
    (0x03, 8),
    (0x04, 6),
    (0x11, 8),
    (0x12, 8),
    (0x13, 4),
    (0x14, 6),
    (0x15, 8),
    (0x16, 8),
    (0x17, 6),
    (0x18, 6),
    (0x19, 6),
    (0x20, 8),
    (0x23, 6),
    (0x24, 6),
    (0x25, 6),
    (0x34, 6),
    (0x35, 6),
    (0x36, 2),
    (0x37, 8),
    (0x38, 8),
    (0x39, 8),
];

/// Human-readable PF name, for the frame log.
pub fn pf_name(pf: u8) -> &'static str {
    match pf {
        0x01 => "ReadProtectionParams",
        0x02 => "ProtectionParams1Reply",
        0x03 => "ProtectionParams2Reply",
        0x04 => "ProtectionParams3Reply",
        0x05 => "SetProtectionParams1",
        0x06 => "SetProtectionParams2",
        0x07 => "SetProtectionParams3",
        0x08 => "SetProtectionReply",
        0x09 => "SetTime",
        0x0A => "SetTimeReply",
        0x0B => "SetWorkingMode",
        0x0C => "SetModeParams23",
        0x0D => "SetModeParam4",
        0x0E => "SetModeReply",
        0x0F => "StartStop",
        0x10 => "StartStopReply",
        0x11 => "DCData",
        0x12 => "CapacityEnergy",
        0x13 => "Status",
        0x14 => "GridVoltage",
        0x15 => "GridCurrent",
        0x16 => "SystemPower",
        0x17 => "LoadVoltage",
        0x18 => "LoadCurrent",
        0x19 => "LoadPower",
        0x1A => "Heartbeat",
        0x1B => "SetBusVoltageReactive",
        0x1C => "SpecialDataReply",
        0x1D => "ReadSpecialData",
        0x1E => "StoredBusVReactive",
        0x1F => "SetIOBUS",
        0x20 => "IOAndAD",
        0x21 => "SetPhaseActivePower",
        0x22 => "SetPhaseReactivePower",
        0x23 => "PhaseAPower",
        0x24 => "PhaseBPower",
        0x25 => "PhaseCPower",
        0x26 => "SetSplitPhaseEnable",
        0x27 => "SplitPhaseEnableReply",
        0x28 => "SetInverterPhase",
        0x29 => "InverterPhaseReply",
        0x2A => "SetReactiveControl",
        0x2B => "ReactiveControlReply",
        0x2C => "SetGridMode",
        0x2D => "GridModeReply",
        0x2E => "SetModuleParallel",
        0x2F => "ModuleParallelReply",
        0x30 => "SetChannelParallel",
        0x31 => "ChannelParallelReply",
        0x32 => "SetBusParallel",
        0x33 => "BusParallelReply",
        0x34 => "ARMVersion",
        0x35 => "DSPVersion",
        0x36 => "ModeParamsReply",
        0x37 => "Params23Reply",
        0x38 => "Param4Reply",
        0x39 => "HighResDC",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_default_is_documented_zero_fill() {
        let buf = encode_heartbeat(&HeartbeatData::default()).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x27, 0x10, 0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn start_stop_requires_previous_vector() {
        assert!(matches!(
            encode_start_stop(ControlAction::Start, None),
            Err(PcsError::MissingContextForControl)
        ));
    }

    #[test]
    fn start_stop_carries_other_flags_over() {
        let prev = ControlFlags {
            start: false,
            clear_fault: false,
            auto_start: true,
        };
        let (buf, next) = encode_start_stop(ControlAction::Start, Some(&prev)).unwrap();
        assert_eq!(buf[0], 1);
        assert_eq!(buf[1], 0);
        assert_eq!(buf[2], 1);
        assert!(next.start && next.auto_start && !next.clear_fault);
    }

    #[test]
    fn mode_frame_plan_length_follows_param_count() {
        let cv = ModeSetpoint::DcConstantVoltage { voltage: 400.0 };
        assert_eq!(mode_frame_plan(&cv).unwrap().len(), 1);

        let cccv = ModeSetpoint::DcCcCv {
            voltage: 420.0,
            current: 30.0,
            end_current: 2.0,
        };
        assert_eq!(mode_frame_plan(&cccv).unwrap().len(), 2);

        let pulse = ModeSetpoint::DcPulseCurrent {
            current_1: 10.0,
            current_2: -10.0,
            cycle_time: 1.0,
            duty_cycle: 50.0,
        };
        assert_eq!(mode_frame_plan(&pulse).unwrap().len(), 3);
    }

    #[test]
    fn dc_power_is_signed_in_both_directions() {
        let d = DcData {
            voltage: 400.0,
            current: -12.5,
            power: -5.0,
            inlet_temperature: 35.0,
        };
        let decoded = decode_dc_data(&encode_dc_data(&d).unwrap()).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn status_frame_is_16_bit_fields() {
        let buf = encode_status(&StatusData {
            running_state: 6,
            fault_code: 0x800D,
        });
        assert_eq!(&buf[..4], &[0x00, 0x06, 0x80, 0x0D]);
        let decoded = decode_status(&buf).unwrap();
        assert_eq!(decoded.fault_code, 0x800D);
    }
}
