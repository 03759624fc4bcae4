//! Golden byte vectors pinned against the protocol document.

use pcs_rs::constants::PCS_DEFAULT_ADDR;
use pcs_rs::protocol::frame::{
    decode_dc_data, decode_high_res_dc, encode_heartbeat, encode_set_mode, mode_frame_plan,
    HeartbeatData,
};
use pcs_rs::protocol::{CanId, ModeSetpoint};

/// Constant-voltage setpoint of 400.000 V.
#[test]
fn golden_constant_voltage_payload() {
    let payload = encode_set_mode(&ModeSetpoint::DcConstantVoltage { voltage: 400.0 }).unwrap();
    assert_eq!(payload, [0x00, 0x02, 0x00, 0x06, 0x1A, 0x80, 0x00, 0x00]);
}

/// Controller-to-PCS command identifier at the default address.
#[test]
fn golden_tx_identifier() {
    assert_eq!(CanId::tx(0x0B, PCS_DEFAULT_ADDR).pack(), 0x180B_FAB4);
}

/// PCS-to-controller telemetry identifier at the default address.
#[test]
fn golden_rx_identifier() {
    assert_eq!(CanId::rx(0x11, PCS_DEFAULT_ADDR).pack(), 0x1811_B4FA);
}

/// Heartbeat with no operator-provided values: 0 V, 0 A (raw 10000 after
/// the +1000 A offset), mirror state "running".
#[test]
fn golden_default_heartbeat() {
    let payload = encode_heartbeat(&HeartbeatData::default()).unwrap();
    assert_eq!(payload, [0x00, 0x00, 0x27, 0x10, 0x02, 0x00, 0x00, 0x00]);
}

/// DC data frame: 400.0 V, +20.0 A discharge, 8.0 kW, 35.0 degC inlet.
#[test]
fn golden_dc_data_frame() {
    let payload = [0x0F, 0xA0, 0x27, 0xD8, 0x00, 0x50, 0x03, 0x52];
    let dc = decode_dc_data(&payload).unwrap();
    assert_eq!(dc.voltage, 400.0);
    assert_eq!(dc.current, 20.0);
    assert_eq!(dc.power, 8.0);
    assert_eq!(dc.inlet_temperature, 35.0);
}

/// High-resolution DC frame: 400.123 V, -1.5 A (charging).
#[test]
fn golden_high_res_dc_frame() {
    // 400123 = 0x00061AFB; (1000 - 1.5) A -> 998500 = 0x000F3C64.
    let payload = [0x00, 0x06, 0x1A, 0xFB, 0x00, 0x0F, 0x3C, 0x64];
    let hires = decode_high_res_dc(&payload).unwrap();
    assert_eq!(hires.voltage, 400.123);
    assert_eq!(hires.current, -1.5);
}

/// CC-CV programming emits the 0x0B frame plus one parameter frame.
#[test]
fn golden_cc_cv_frame_plan() {
    let setpoint = ModeSetpoint::DcCcCv {
        voltage: 420.0,
        current: -30.0,
        end_current: 2.0,
    };
    let plan = mode_frame_plan(&setpoint).unwrap();
    assert_eq!(plan.len(), 2);

    let (pf, payload) = plan[0];
    assert_eq!(pf, 0x0B);
    // mode 0x0029, voltage 420000 = 0x000668A0
    assert_eq!(payload, [0x00, 0x29, 0x00, 0x06, 0x68, 0xA0, 0x00, 0x00]);

    let (pf, payload) = plan[1];
    assert_eq!(pf, 0x0C);
    // current -30000 = 0xFFFF8AD0, end current 2000 = 0x000007D0
    assert_eq!(payload, [0xFF, 0xFF, 0x8A, 0xD0, 0x00, 0x00, 0x07, 0xD0]);
}
