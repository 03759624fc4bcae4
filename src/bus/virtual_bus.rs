//! In-process virtual CAN bus.
//!
//! A broadcast hub connecting any number of endpoints. A frame sent by one
//! endpoint is delivered to every other open endpoint whose filters accept
//! it; the sender never receives its own frames. Used by the simulator and
//! the test suite in place of hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;

use crate::bus::{BusAdapter, BusFrame, BusStats, BusStatsSnapshot, FrameFilter};
use crate::error::{PcsError, SendError};

#[derive(Default)]
struct Hub {
    next_id: usize,
    taps: Vec<Tap>,
}

struct Tap {
    id: usize,
    sender: Sender<BusFrame>,
    filters: Vec<FrameFilter>,
}

/// The shared bus; cheap to clone, endpoints attach with [`VirtualBus::endpoint`].
#[derive(Clone, Default)]
pub struct VirtualBus {
    hub: Arc<Mutex<Hub>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        VirtualBus::default()
    }

    /// Attaches a new endpoint with no filters (accept all).
    pub fn endpoint(&self) -> VirtualBusEndpoint {
        let (tx, rx) = mpsc::channel();
        let mut hub = self.hub.lock().unwrap();
        let id = hub.next_id;
        hub.next_id += 1;
        hub.taps.push(Tap {
            id,
            sender: tx,
            filters: Vec::new(),
        });
        VirtualBusEndpoint {
            hub: Arc::clone(&self.hub),
            id,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
            stats: BusStats::default(),
        }
    }
}

/// One endpoint on the virtual bus.
pub struct VirtualBusEndpoint {
    hub: Arc<Mutex<Hub>>,
    id: usize,
    rx: Mutex<Receiver<BusFrame>>,
    closed: AtomicBool,
    stats: BusStats,
}

impl BusAdapter for VirtualBusEndpoint {
    fn send(&self, id: u32, data: &[u8]) -> Result<(), SendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        let frame = BusFrame {
            id,
            data: data.to_vec(),
            timestamp: Instant::now(),
        };
        let hub = self.hub.lock().unwrap();
        for tap in hub.taps.iter().filter(|t| t.id != self.id) {
            if tap.filters.is_empty() || tap.filters.iter().any(|f| f.matches(id)) {
                // A dropped receiver only means the peer went away.
                let _ = tap.sender.send(frame.clone());
            }
        }
        self.stats.note_tx();
        Ok(())
    }

    fn recv(&self, deadline: Duration) -> Option<BusFrame> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let rx = self.rx.lock().unwrap();
        match rx.recv_timeout(deadline) {
            Ok(frame) => {
                self.stats.note_rx();
                Some(frame)
            }
            Err(_) => None,
        }
    }

    fn install_filters(&self, filters: &[FrameFilter]) -> Result<(), PcsError> {
        let mut hub = self.hub.lock().unwrap();
        if let Some(tap) = hub.taps.iter_mut().find(|t| t.id == self.id) {
            tap.filters = filters.to_vec();
            debug!("virtual endpoint {}: {} filters installed", self.id, filters.len());
        }
        Ok(())
    }

    fn reconnect(&self) -> bool {
        // Nothing to re-establish in process; only a closed endpoint stays down.
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut hub = self.hub.lock().unwrap();
        hub.taps.retain(|t| t.id != self.id);
        debug!("virtual endpoint {} closed", self.id);
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn stats(&self) -> BusStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for VirtualBusEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reach_other_endpoints_but_not_the_sender() {
        let bus = VirtualBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();

        a.send(0x1811_B4FA, &[1, 2, 3]).unwrap();
        let got = b.recv(Duration::from_millis(100)).expect("frame");
        assert_eq!(got.id, 0x1811_B4FA);
        assert_eq!(got.data, vec![1, 2, 3]);

        assert!(a.recv(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn filters_drop_unmatched_frames() {
        let bus = VirtualBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();
        b.install_filters(&[FrameFilter { pf: 0x13, ps: 0xB4 }]).unwrap();

        a.send(0x1811_B4FA, &[0; 8]).unwrap();
        a.send(0x1813_B4FA, &[0; 8]).unwrap();

        let got = b.recv(Duration::from_millis(100)).expect("frame");
        assert_eq!((got.id >> 16) & 0xFF, 0x13);
        assert!(b.recv(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn closed_endpoint_refuses_send_and_recv() {
        let bus = VirtualBus::new();
        let a = bus.endpoint();
        a.close();
        assert!(matches!(a.send(0, &[]), Err(SendError::Closed)));
        assert!(a.recv(Duration::from_millis(10)).is_none());
        assert!(!a.is_open());
        // Second close is a no-op.
        a.close();
    }

    #[test]
    fn stats_count_traffic() {
        let bus = VirtualBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();
        a.send(0x100, &[0]).unwrap();
        let _ = b.recv(Duration::from_millis(100));
        assert_eq!(a.stats().tx_frames, 1);
        assert_eq!(b.stats().rx_frames, 1);
    }
}
