//! SocketCAN hardware backend (Linux).
//!
//! The bit rate itself is configured on the interface (`ip link set can0 up
//! type can bitrate 250000`); this backend opens the raw socket, pushes
//! acceptance filters to the kernel, and maps driver errors onto the
//! adapter's error taxonomy.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use socketcan::{CanFilter, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, SocketOptions};

use crate::bus::{
    backoff_delay, BusAdapter, BusConfig, BusFrame, BusStats, BusStatsSnapshot, FrameFilter,
    InterfaceKind,
};
use crate::error::{PcsError, SendError};

const EFF_FLAG: u32 = 0x8000_0000;
const ENETDOWN: i32 = 100;

/// Hardware bus endpoint over SocketCAN.
pub struct HardwareBus {
    config: BusConfig,
    socket: RwLock<Option<CanSocket>>,
    filters: Mutex<Vec<FrameFilter>>,
    closed: AtomicBool,
    reconnect_attempt: AtomicU32,
    stats: BusStats,
}

impl HardwareBus {
    /// Opens the configured channel and installs the initial filters.
    pub fn open(config: BusConfig) -> Result<Self, PcsError> {
        if config.kind != InterfaceKind::Hardware {
            return Err(PcsError::InvalidConfig(
                "HardwareBus requires InterfaceKind::Hardware".into(),
            ));
        }
        config.warn_if_off_spec();
        let socket = CanSocket::open(&config.channel).map_err(|e| {
            PcsError::InvalidConfig(format!("cannot open CAN channel {}: {e}", config.channel))
        })?;
        info!("opened SocketCAN channel {}", config.channel);
        let bus = HardwareBus {
            filters: Mutex::new(config.filters.clone()),
            config,
            socket: RwLock::new(Some(socket)),
            closed: AtomicBool::new(false),
            reconnect_attempt: AtomicU32::new(0),
            stats: BusStats::default(),
        };
        bus.push_filters()?;
        Ok(bus)
    }

    fn push_filters(&self) -> Result<(), PcsError> {
        let filters = self.filters.lock().unwrap();
        let socket = self.socket.read().unwrap();
        let Some(socket) = socket.as_ref() else {
            return Ok(());
        };
        if filters.is_empty() {
            return Ok(());
        }
        let kernel: Vec<CanFilter> = filters
            .iter()
            .map(|f| {
                let id = EFF_FLAG | ((f.pf as u32) << 16) | ((f.ps as u32) << 8);
                CanFilter::new(id, EFF_FLAG | 0x00FF_FF00)
            })
            .collect();
        socket
            .set_filters(kernel.as_slice())
            .map_err(|e| PcsError::InvalidConfig(format!("cannot install CAN filters: {e}")))?;
        debug!("installed {} kernel filters", kernel.len());
        Ok(())
    }

    fn classify(err: std::io::Error) -> SendError {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => SendError::Timeout,
            _ if err.raw_os_error() == Some(ENETDOWN) => SendError::BusOff,
            _ => SendError::Transient(err),
        }
    }

    fn send_once(&self, id: u32, data: &[u8]) -> Result<(), SendError> {
        let socket = self.socket.read().unwrap();
        let Some(socket) = socket.as_ref() else {
            return Err(SendError::Transient(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "socket is down pending reconnect",
            )));
        };
        let ext = ExtendedId::new(id).ok_or_else(|| {
            SendError::Transient(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "identifier exceeds 29 bits",
            ))
        })?;
        let frame = CanFrame::new(Id::Extended(ext), data).ok_or_else(|| {
            SendError::Transient(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "payload exceeds 8 bytes",
            ))
        })?;
        socket.write_frame(&frame).map_err(Self::classify)
    }
}

impl BusAdapter for HardwareBus {
    fn send(&self, id: u32, data: &[u8]) -> Result<(), SendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        match self.send_once(id, data) {
            Ok(()) => {
                self.stats.note_tx();
                Ok(())
            }
            Err(SendError::Transient(first)) => {
                debug!("transient TX error, retrying once: {first}");
                match self.send_once(id, data) {
                    Ok(()) => {
                        self.stats.note_tx();
                        Ok(())
                    }
                    Err(e) => {
                        self.stats.note_error();
                        Err(e)
                    }
                }
            }
            Err(e) => {
                self.stats.note_error();
                Err(e)
            }
        }
    }

    fn recv(&self, deadline: Duration) -> Option<BusFrame> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let socket = self.socket.read().unwrap();
        let Some(socket) = socket.as_ref() else {
            drop(socket);
            std::thread::sleep(deadline);
            return None;
        };
        match socket.read_frame_timeout(deadline) {
            Ok(CanFrame::Data(frame)) => {
                let Id::Extended(ext) = frame.id() else {
                    // 11-bit identifiers are outside this protocol.
                    return None;
                };
                self.stats.note_rx();
                Some(BusFrame {
                    id: ext.as_raw(),
                    data: frame.data().to_vec(),
                    timestamp: Instant::now(),
                })
            }
            Ok(_) => None,
            Err(e) => {
                if !matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) {
                    self.stats.note_error();
                    debug!("RX error on {}: {e}", self.config.channel);
                }
                None
            }
        }
    }

    fn install_filters(&self, filters: &[FrameFilter]) -> Result<(), PcsError> {
        *self.filters.lock().unwrap() = filters.to_vec();
        self.push_filters()
    }

    fn reconnect(&self) -> bool {
        {
            let mut socket = self.socket.write().unwrap();
            *socket = None;
        }
        let cap = self.config.reconnect_backoff_cap;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return false;
            }
            let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst);
            match CanSocket::open(&self.config.channel) {
                Ok(new_socket) => {
                    *self.socket.write().unwrap() = Some(new_socket);
                    self.reconnect_attempt.store(0, Ordering::SeqCst);
                    if let Err(e) = self.push_filters() {
                        warn!("filters not restored after reconnect: {e}");
                    }
                    info!("reconnected to {}", self.config.channel);
                    return true;
                }
                Err(e) => {
                    let delay = backoff_delay(attempt, cap);
                    warn!(
                        "reconnect attempt {} on {} failed ({e}), next in {:?}",
                        attempt + 1,
                        self.config.channel,
                        delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.socket.write().unwrap() = None;
        info!("closed SocketCAN channel {}", self.config.channel);
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn stats(&self) -> BusStatsSnapshot {
        self.stats.snapshot()
    }
}
