//! 29-bit extended identifier codec.
//!
//! The protocol reuses the J1939 identifier layout:
//!
//! ```text
//! [28:26] priority   (3 bits)
//! [25]    reserved   (1 bit, always 0)
//! [24]    data page  (1 bit, always 0)
//! [23:16] PF         PDU Format, the message type
//! [15:8]  PS         PDU Specific, the target address
//! [7:0]   SA         source address
//! ```
//!
//! The extended-frame flag lives on the adapter side, never in the packed
//! integer.

use serde::{Deserialize, Serialize};

use crate::constants::{CAN_PRIORITY, CONTROLLER_ADDR};
use crate::error::PcsError;

/// Decomposed 29-bit extended CAN identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanId {
    pub priority: u8,
    pub pf: u8,
    pub ps: u8,
    pub sa: u8,
}

impl CanId {
    /// Builds an identifier, validating the priority range.
    pub fn new(priority: u8, pf: u8, ps: u8, sa: u8) -> Result<Self, PcsError> {
        if priority > 0x07 {
            return Err(PcsError::InvalidIdentifier(format!(
                "priority {priority} exceeds 3-bit range"
            )));
        }
        Ok(CanId { priority, pf, ps, sa })
    }

    /// Identifier for a frame FROM the controller TO the PCS.
    pub fn tx(pf: u8, pcs_addr: u8) -> Self {
        CanId {
            priority: CAN_PRIORITY,
            pf,
            ps: pcs_addr,
            sa: CONTROLLER_ADDR,
        }
    }

    /// Identifier for a frame FROM the PCS TO the controller.
    pub fn rx(pf: u8, pcs_addr: u8) -> Self {
        CanId {
            priority: CAN_PRIORITY,
            pf,
            ps: CONTROLLER_ADDR,
            sa: pcs_addr,
        }
    }

    /// Packs the fields into a 29-bit arbitration id. Reserved and data-page
    /// bits stay clear, so the result always fits 29 bits.
    pub fn pack(&self) -> u32 {
        ((self.priority as u32 & 0x07) << 26)
            | ((self.pf as u32) << 16)
            | ((self.ps as u32) << 8)
            | self.sa as u32
    }

    /// Unpacks a 29-bit arbitration id.
    pub fn unpack(raw: u32) -> Result<Self, PcsError> {
        if raw >= 1 << 29 {
            return Err(PcsError::InvalidIdentifier(format!(
                "0x{raw:08X} exceeds 29-bit range"
            )));
        }
        Ok(CanId {
            priority: ((raw >> 26) & 0x07) as u8,
            pf: ((raw >> 16) & 0xFF) as u8,
            ps: ((raw >> 8) & 0xFF) as u8,
            sa: (raw & 0xFF) as u8,
        })
    }

    /// True iff this frame travels from the PCS at `pcs_addr` to the
    /// controller.
    pub fn is_from_pcs(&self, pcs_addr: u8) -> bool {
        self.sa == pcs_addr && self.ps == CONTROLLER_ADDR
    }

    /// True iff this frame travels from the controller to the PCS at
    /// `pcs_addr`.
    pub fn is_to_pcs(&self, pcs_addr: u8) -> bool {
        self.sa == CONTROLLER_ADDR && self.ps == pcs_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PCS_DEFAULT_ADDR;

    #[test]
    fn packs_command_id_to_pcs() {
        let id = CanId::tx(0x0B, PCS_DEFAULT_ADDR);
        assert_eq!(id.pack(), 0x180B_FAB4);
    }

    #[test]
    fn packs_status_id_from_pcs() {
        let id = CanId::rx(0x11, PCS_DEFAULT_ADDR);
        assert_eq!(id.pack(), 0x1811_B4FA);
        assert!(id.is_from_pcs(PCS_DEFAULT_ADDR));
        assert!(!id.is_to_pcs(PCS_DEFAULT_ADDR));
    }

    #[test]
    fn rejects_out_of_range_priority() {
        assert!(CanId::new(8, 0, 0, 0).is_err());
    }

    #[test]
    fn rejects_ids_beyond_29_bits() {
        assert!(CanId::unpack(1 << 29).is_err());
        assert!(CanId::unpack(u32::MAX).is_err());
    }
}
