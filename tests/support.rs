//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use pcs_rs::bus::virtual_bus::VirtualBus;
use pcs_rs::session::{LinkState, PcsSession, SessionConfig};
use pcs_rs::simulator::{SimulatedPcs, SimulatorConfig};

/// Polls `pred` every 20 ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    pred()
}

/// Spawns a simulator and a session on a shared virtual bus and waits for
/// the link to come up.
pub fn sim_session() -> (VirtualBus, SimulatedPcs, PcsSession) {
    pcs_rs::init_logger();
    let bus = VirtualBus::new();
    let sim = SimulatedPcs::spawn(&bus, SimulatorConfig::default());
    let adapter = Arc::new(bus.endpoint());
    let session = PcsSession::start(adapter, SessionConfig::default()).expect("session");
    assert!(
        wait_until(Duration::from_secs(2), || session.link_state() == LinkState::Connected),
        "link did not come up"
    );
    assert!(
        wait_until(Duration::from_secs(2), || session.status().is_some()),
        "no status frame observed"
    );
    (bus, sim, session)
}
