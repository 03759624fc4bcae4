//! YSTECH PCS CAN Protocol Constants
//!
//! Address allocation, timing requirements, and identifier defaults for the
//! external CAN communication protocol (CAN 2.0B extended frames, J1939-based
//! identifier layout, 250 kbit/s).

use std::time::Duration;

/// CAN bus bit rate required by the PCS protocol.
pub const CAN_BITRATE: u32 = 250_000;

/// Default message priority (3-bit field of the 29-bit identifier).
pub const CAN_PRIORITY: u8 = 6;

/// Source address of this controller ("other devices" allocation).
pub const CONTROLLER_ADDR: u8 = 0xB4;

/// Factory-default PCS device address.
pub const PCS_DEFAULT_ADDR: u8 = 0xFA;

/// Broadcast address.
pub const BROADCAST_ADDR: u8 = 0x00;

/// Cadence of the controller heartbeat frame (PF=0x1A).
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(200);

/// Silence on the controller side after which the PCS latches a CAN1
/// communication fault and shuts down.
pub const CAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Fault code latched by the PCS on CAN1 communication loss.
pub const CAN1_COMM_FAULT: u16 = 0x800D;

/// Default window after which an inbound frame family counts as stale.
pub const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(1);

/// Default RX silence before the session degrades the link.
pub const DEFAULT_RX_TIMEOUT: Duration = Duration::from_secs(1);

/// Default wait for a command reply.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

/// Ceiling of the adapter reconnect backoff schedule.
pub const DEFAULT_RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// First delay of the reconnect backoff schedule (doubled per attempt).
pub const RECONNECT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Deadline of a single receive-pump poll.
pub const RX_POLL_DEADLINE: Duration = Duration::from_millis(100);
