//! Unit tests for the 29-bit identifier codec.

use pcs_rs::constants::{CONTROLLER_ADDR, PCS_DEFAULT_ADDR};
use pcs_rs::protocol::CanId;

/// Tests that pack/unpack round-trips over the whole priority and PF space,
/// with a spread of addresses, and that every packed value fits 29 bits.
#[test]
fn pack_unpack_round_trip() {
    let addresses = [0x00u8, 0x01, 0x7F, 0x80, 0xB4, 0xFA, 0xFF];
    for priority in 0..=7u8 {
        for pf in 0..=255u8 {
            for &ps in &addresses {
                for &sa in &addresses {
                    let id = CanId::new(priority, pf, ps, sa).unwrap();
                    let raw = id.pack();
                    assert!(raw < 1 << 29, "0x{raw:08X} exceeds 29 bits");
                    assert_eq!(CanId::unpack(raw).unwrap(), id);
                }
            }
        }
    }
}

/// Tests the reserved and data-page bits stay clear.
#[test]
fn reserved_and_data_page_bits_are_clear() {
    let raw = CanId::tx(0xFF, 0xFF).pack();
    assert_eq!((raw >> 25) & 0x01, 0);
    assert_eq!((raw >> 24) & 0x01, 0);
}

/// Tests the documented controller-to-PCS identifier (PF=0x0B to 0xFA).
#[test]
fn command_identifier_to_pcs() {
    assert_eq!(CanId::tx(0x0B, PCS_DEFAULT_ADDR).pack(), 0x180B_FAB4);
}

/// Tests the documented PCS-to-controller identifier (PF=0x11 from 0xFA).
#[test]
fn status_identifier_from_pcs() {
    let id = CanId::rx(0x11, PCS_DEFAULT_ADDR);
    assert_eq!(id.pack(), 0x1811_B4FA);
    assert!(id.is_from_pcs(PCS_DEFAULT_ADDR));
}

/// Tests the direction predicates against both address layouts.
#[test]
fn direction_predicates() {
    let inbound = CanId::unpack(0x1811_B4FA).unwrap();
    assert!(inbound.is_from_pcs(PCS_DEFAULT_ADDR));
    assert!(!inbound.is_to_pcs(PCS_DEFAULT_ADDR));

    let outbound = CanId::unpack(0x180B_FAB4).unwrap();
    assert!(outbound.is_to_pcs(PCS_DEFAULT_ADDR));
    assert!(!outbound.is_from_pcs(PCS_DEFAULT_ADDR));

    // A different PCS address matches neither direction.
    assert!(!inbound.is_from_pcs(0xE0));
    assert!(!outbound.is_to_pcs(0xE0));

    assert_eq!(inbound.ps, CONTROLLER_ADDR);
}

/// Tests that out-of-range inputs are refused.
#[test]
fn invalid_inputs_are_refused() {
    assert!(CanId::new(8, 0, 0, 0).is_err());
    assert!(CanId::unpack(1 << 29).is_err());
    assert!(CanId::unpack(0xFFFF_FFFF).is_err());
    assert!(CanId::unpack((1 << 29) - 1).is_ok());
}
