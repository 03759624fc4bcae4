//! # pcs-rs - A Rust Crate for YSTECH PCS CAN Communication
//!
//! The pcs-rs crate is a host-side driver and control client for YSTECH
//! bidirectional AC/DC Power Conversion System (PCS) modules, speaking the
//! J1939-derived application protocol over CAN 2.0B at 250 kbit/s.
//!
//! ## Features
//!
//! - Bit-exact codec for the 29-bit extended identifier layout and the
//!   protocol's fixed big-endian payload frames
//! - Session controller with a 200 ms heartbeat, continuous status
//!   decoding, and a synchronous request/reply command surface
//! - Abstract bus adapter with SocketCAN hardware and in-process virtual
//!   backends
//! - Loopback PCS simulator for hardware-free testing
//! - CSV/JSONL frame-record formats for offline analysis
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pcs_rs::bus::virtual_bus::VirtualBus;
//! use pcs_rs::session::{PcsSession, SessionConfig};
//! use pcs_rs::simulator::{SimulatedPcs, SimulatorConfig};
//!
//! let bus = VirtualBus::new();
//! let _pcs = SimulatedPcs::spawn(&bus, SimulatorConfig::default());
//! let adapter = Arc::new(bus.endpoint());
//! let mut session = PcsSession::start(adapter, SessionConfig::default()).unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(500));
//! if let Some(dc) = session.dc() {
//!     println!("DC bus: {:.1} V, {:.1} A", dc.value.voltage, dc.value.current);
//! }
//! session.close();
//! ```

pub mod bus;
pub mod constants;
pub mod error;
pub mod framelog;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod simulator;
pub mod state;

pub use error::{PcsError, SendError};
pub use logging::init_logger;
pub use protocol::{CanId, ModeSetpoint, RunningState, RxFrame, StatusData};
pub use session::{LinkState, PcsSession, SessionConfig};
pub use simulator::{SimulatedPcs, SimulatorConfig};
pub use state::{FieldReading, PcsSnapshot, Stamped};
