//! Integration tests: session controller against the simulated PCS.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use pcs_rs::constants::CAN1_COMM_FAULT;
use pcs_rs::error::PcsError;
use pcs_rs::protocol::frame::ProtectionPage;
use pcs_rs::protocol::{ModeSetpoint, RxFrame};
use pcs_rs::session::{LinkState, ProtectionParams};

use support::{sim_session, wait_until};

/// The periodic frames populate the snapshot and bring the link up.
#[test]
fn telemetry_populates_snapshot() {
    let (_bus, _sim, session) = sim_session();

    assert!(wait_until(Duration::from_secs(2), || session.dc().is_some()));
    let dc = session.dc().unwrap();
    assert!(dc.fresh);
    assert!(dc.value.voltage > 300.0);

    assert!(wait_until(Duration::from_secs(2), || session.status().is_some()));
    let status = session.status().unwrap();
    assert_eq!(status.value.fault_code, 0);
    assert!(session.dc_hires().is_some() || session.system_power().is_some());
}

/// Enable path: acknowledgement plus running-state transition; disable
/// returns the device to a stopped state.
#[test]
fn enable_then_disable() {
    let (_bus, sim, session) = sim_session();

    session.enable().expect("enable");
    assert!(sim.started());
    assert!(session.status().unwrap().value.state().is_active());

    session.disable().expect("disable");
    assert!(!sim.started());
    assert!(wait_until(Duration::from_secs(1), || {
        session.status().map(|s| s.value.state().is_stopped()).unwrap_or(false)
    }));
}

/// A latched CAN1 fault from the device faults the session; clearing it
/// restores the link.
#[test]
fn fault_latch_and_reset() {
    let (_bus, sim, session) = sim_session();

    sim.inject_fault(CAN1_COMM_FAULT);
    assert!(wait_until(Duration::from_secs(2), || {
        session.link_state() == LinkState::Faulted
    }));
    let (code, text) = session.fault();
    assert_eq!(code, CAN1_COMM_FAULT);
    assert!(text.contains("CAN1"));

    session.reset_faults().expect("reset_faults");
    assert_eq!(sim.fault_code(), 0);
    assert_eq!(session.link_state(), LinkState::Connected);
    assert!(wait_until(Duration::from_secs(1), || {
        session.fault().0 == 0
    }));
}

/// Mode changes are refused while the device runs, and no mode frame
/// reaches the simulator.
#[test]
fn mode_change_requires_stopped() {
    let (_bus, sim, session) = sim_session();

    session.enable().expect("enable");
    let mode_before = sim.working_mode();

    let result = session.set_mode(&ModeSetpoint::DcConstantVoltage { voltage: 400.0 });
    assert!(matches!(result, Err(PcsError::ModeChangeWhileRunning)));
    assert_eq!(sim.working_mode(), mode_before);

    session.disable().expect("disable");
    session
        .set_mode(&ModeSetpoint::DcConstantVoltage { voltage: 400.0 })
        .expect("set_mode while stopped");
    assert_eq!(sim.working_mode(), 0x02);
}

/// Programming a multi-parameter mode delivers every parameter frame.
#[test]
fn multi_parameter_mode_reaches_the_simulator() {
    let (_bus, sim, session) = sim_session();

    session
        .set_mode(&ModeSetpoint::DcCcCv {
            voltage: 420.0,
            current: -30.0,
            end_current: 2.0,
        })
        .expect("set_mode");
    assert_eq!(sim.working_mode(), 0x29);
}

/// Two concurrent requests on the same reply PF: one wins, one gets Busy.
#[test]
fn one_in_flight_request_per_pf() {
    let (_bus, _sim, session) = sim_session();
    let session = Arc::new(session);
    let barrier = Arc::new(Barrier::new(2));
    let busy_count = Arc::new(AtomicUsize::new(0));
    let ok_count = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let session = Arc::clone(&session);
        let barrier = Arc::clone(&barrier);
        let busy_count = Arc::clone(&busy_count);
        let ok_count = Arc::clone(&ok_count);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            match session.enable() {
                Ok(()) => ok_count.fetch_add(1, Ordering::SeqCst),
                Err(PcsError::Busy(0x10)) => busy_count.fetch_add(1, Ordering::SeqCst),
                Err(other) => panic!("unexpected error: {other:?}"),
            };
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ok_count.load(Ordering::SeqCst), 1, "exactly one enable succeeds");
    assert_eq!(busy_count.load(Ordering::SeqCst), 1, "the loser sees Busy");
}

/// Pausing one telemetry family turns only that field stale.
#[test]
fn snapshot_freshness_window() {
    let (_bus, sim, session) = sim_session();
    assert!(wait_until(Duration::from_secs(2), || session.dc().is_some()));

    sim.suppress_pf(0x11, true);
    std::thread::sleep(Duration::from_millis(1500));

    let dc = session.dc().expect("last value is retained");
    assert!(!dc.fresh, "dc must be stale after 1.5 s of silence");
    let status = session.status().expect("status");
    assert!(status.fresh, "status keeps flowing");
}

/// Subscribers run on the pump thread; a panicking callback is contained.
#[test]
fn subscribers_survive_a_panicking_peer() {
    let (_bus, _sim, session) = sim_session();

    let seen = Arc::new(Mutex::new(Vec::new()));
    session.subscribe(|_, _| panic!("misbehaving subscriber"));
    {
        let seen = Arc::clone(&seen);
        session.subscribe(move |pf, frame| {
            if matches!(frame, RxFrame::Status(_)) {
                seen.lock().unwrap().push(pf);
            }
        });
    }

    assert!(wait_until(Duration::from_secs(2), || {
        !seen.lock().unwrap().is_empty()
    }));
    assert!(session.link_state() == LinkState::Connected);
}

/// Reads and writes of the auxiliary command surface.
#[test]
fn auxiliary_commands() {
    let (_bus, _sim, session) = sim_session();

    match session.read_protection_params(ProtectionPage::VoltageCurrent) {
        Ok(ProtectionParams::VoltageCurrent(p)) => {
            assert_eq!(p.max_output_voltage, 800.0);
            assert_eq!(p.max_charge_current, 150.0);
        }
        other => panic!("unexpected protection reply: {other:?}"),
    }

    let version = session.read_firmware_version().expect("version");
    assert_eq!((version.sw_v, version.sw_b, version.sw_d), (2, 1, 38));

    let mode = session.read_working_mode().expect("mode");
    assert_eq!(mode, 0x91);

    let mut limits = match session.read_protection_params(ProtectionPage::VoltageCurrent) {
        Ok(ProtectionParams::VoltageCurrent(p)) => p,
        other => panic!("unexpected protection reply: {other:?}"),
    };
    limits.max_charge_current = 120.0;
    session.set_protection_params1(&limits).expect("set limits");
    match session.read_protection_params(ProtectionPage::VoltageCurrent) {
        Ok(ProtectionParams::VoltageCurrent(p)) => assert_eq!(p.max_charge_current, 120.0),
        other => panic!("unexpected protection reply: {other:?}"),
    }
}
