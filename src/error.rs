//! # PCS Error Handling
//!
//! This module defines the error types of the pcs-rs crate: `PcsError` for
//! protocol, session, and configuration failures, and `SendError` for bus
//! transmit failures surfaced by adapters.

use thiserror::Error;

/// Errors surfaced by a bus adapter when transmitting a frame.
#[derive(Debug, Error)]
pub enum SendError {
    /// The controller went bus-off.
    #[error("CAN controller is bus-off")]
    BusOff,

    /// The driver transmit queue did not drain in time.
    #[error("transmit timed out")]
    Timeout,

    /// The adapter has been closed.
    #[error("bus adapter is closed")]
    Closed,

    /// A transient I/O failure; retried once inside the adapter before
    /// being surfaced.
    #[error("transient bus error: {0}")]
    Transient(#[from] std::io::Error),
}

/// Represents the different error types that can occur in the PCS crate.
#[derive(Debug, Error)]
pub enum PcsError {
    /// A payload was shorter than the fields its decoder reads.
    #[error("truncated frame PF=0x{pf:02X}: have {have} bytes, need {need}")]
    TruncatedFrame { pf: u8, have: usize, need: usize },

    /// No decoder is registered for the PF.
    #[error("unknown PF: 0x{0:02X}")]
    UnknownPf(u8),

    /// An engineering value does not fit the raw integer after scaling.
    #[error("value out of range for PF=0x{pf:02X} field `{field}`")]
    OutOfRange { pf: u8, field: &'static str },

    /// A working-mode code with no encoder.
    #[error("unknown working mode: 0x{0:04X}")]
    UnknownMode(u16),

    /// A control frame was requested without the previous control vector.
    #[error("missing previous control state for PF=0x0F")]
    MissingContextForControl,

    /// The session has no live link to the PCS.
    #[error("not connected to PCS")]
    NotConnected,

    /// Another request is already in flight for the same reply PF.
    #[error("request already pending for PF=0x{0:02X}")]
    Busy(u8),

    /// No reply arrived within the command timeout.
    #[error("command timed out waiting for PF=0x{0:02X}")]
    CommandTimeout(u8),

    /// The PCS answered with a negative acknowledgement.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// A working-mode change was attempted while the PCS is not stopped.
    #[error("mode change refused: PCS is not stopped")]
    ModeChangeWhileRunning,

    /// An identifier field is out of its documented range.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A session or bus configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A bus-level failure escalated to the caller.
    #[error("bus error: {0}")]
    Bus(#[from] SendError),
}
