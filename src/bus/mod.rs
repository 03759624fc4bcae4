//! # CAN Bus Adapter Layer
//!
//! Abstract send/receive of `(id, payload)` pairs with monotonic receive
//! timestamps, lifecycle management (open, close, reconnect with exponential
//! backoff), and filter installation. Two backends: SocketCAN hardware
//! (Linux) and an in-process virtual bus used by the simulator and the test
//! suite.

pub mod virtual_bus;

#[cfg(target_os = "linux")]
pub mod socketcan;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::warn;

use crate::constants::{CAN_BITRATE, DEFAULT_RECONNECT_BACKOFF_CAP, RECONNECT_BACKOFF_BASE};
use crate::error::{PcsError, SendError};

/// One raw frame on the bus, stamped with the monotonic receive time.
#[derive(Debug, Clone)]
pub struct BusFrame {
    pub id: u32,
    pub data: Vec<u8>,
    pub timestamp: Instant,
}

/// Acceptance filter over the PF and PS fields of the 29-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFilter {
    pub pf: u8,
    pub ps: u8,
}

impl FrameFilter {
    /// True iff a packed identifier matches this filter.
    pub fn matches(&self, id: u32) -> bool {
        ((id >> 16) & 0xFF) as u8 == self.pf && ((id >> 8) & 0xFF) as u8 == self.ps
    }
}

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Hardware,
    Virtual,
}

/// Configuration for opening a bus adapter.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Channel selector passed to the backend (e.g. `can0`).
    pub channel: String,
    /// CAN bit rate; values other than 250 000 are accepted with a warning.
    pub bitrate: u32,
    pub kind: InterfaceKind,
    /// Initial acceptance filters; empty accepts everything.
    pub filters: Vec<FrameFilter>,
    /// Ceiling of the reconnect backoff schedule.
    pub reconnect_backoff_cap: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            channel: String::from("can0"),
            bitrate: CAN_BITRATE,
            kind: InterfaceKind::Hardware,
            filters: Vec::new(),
            reconnect_backoff_cap: DEFAULT_RECONNECT_BACKOFF_CAP,
        }
    }
}

impl BusConfig {
    /// Logs the off-spec bitrate warning; called by backends at open time.
    pub fn warn_if_off_spec(&self) {
        if self.bitrate != CAN_BITRATE {
            warn!(
                "bitrate {} differs from the protocol's {} bit/s",
                self.bitrate, CAN_BITRATE
            );
        }
    }
}

/// Frame counters shared by all backends.
#[derive(Debug, Default)]
pub struct BusStats {
    tx_frames: AtomicU64,
    rx_frames: AtomicU64,
    errors: AtomicU64,
}

impl BusStats {
    pub fn note_tx(&self) {
        self.tx_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_rx(&self) {
        self.rx_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStatsSnapshot {
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub errors: u64,
}

/// Abstract bus endpoint. Implementations are shareable across the session's
/// pump, heartbeat, and caller threads.
pub trait BusAdapter: Send + Sync {
    /// Transmits one frame. Transient I/O failures are retried once inside
    /// the adapter before being surfaced.
    fn send(&self, id: u32, data: &[u8]) -> Result<(), SendError>;

    /// Waits up to `deadline` for one inbound frame. Returns `None` on
    /// deadline (and when the adapter is closed) without raising.
    fn recv(&self, deadline: Duration) -> Option<BusFrame>;

    /// Installs acceptance filters by (PF, PS); replaces any previous set.
    fn install_filters(&self, filters: &[FrameFilter]) -> Result<(), PcsError>;

    /// Re-opens the backend with exponential backoff (100 ms doubling up to
    /// the configured cap), retrying until it succeeds or the adapter is
    /// closed. Returns false when closed first.
    fn reconnect(&self) -> bool;

    /// Closes the endpoint; subsequent sends fail with `Closed`.
    fn close(&self);

    fn is_open(&self) -> bool;

    fn stats(&self) -> BusStatsSnapshot;
}

/// Reconnect backoff schedule: 100 ms doubling per attempt, capped.
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let base = RECONNECT_BACKOFF_BASE;
    let exp = attempt.min(16);
    let delay = base.saturating_mul(1u32 << exp);
    delay.min(cap)
}

/// Lists CAN interfaces visible to this host. Best effort: returns an empty
/// list rather than failing.
pub fn list_interfaces() -> Vec<String> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir("/sys/class/net") {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("can") || name.starts_with("vcan") {
                found.push(name);
            }
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_doubles_and_caps() {
        let cap = Duration::from_secs(5);
        assert_eq!(backoff_delay(0, cap), Duration::from_millis(100));
        assert_eq!(backoff_delay(1, cap), Duration::from_millis(200));
        assert_eq!(backoff_delay(2, cap), Duration::from_millis(400));
        assert_eq!(backoff_delay(3, cap), Duration::from_millis(800));
        assert_eq!(backoff_delay(4, cap), Duration::from_millis(1600));
        assert_eq!(backoff_delay(5, cap), Duration::from_millis(3200));
        assert_eq!(backoff_delay(6, cap), cap);
        assert_eq!(backoff_delay(30, cap), cap);
    }

    #[test]
    fn filter_matches_pf_and_ps() {
        let filter = FrameFilter { pf: 0x11, ps: 0xB4 };
        assert!(filter.matches(0x1811_B4FA));
        assert!(!filter.matches(0x1812_B4FA));
        assert!(!filter.matches(0x1811_FAB4));
    }

    #[test]
    fn list_interfaces_never_fails() {
        let _ = list_interfaces();
    }
}
